//! Streaming access to a single top-level element of an XML document.
//!
//! Both functions walk the document with `quick-xml` events so everything
//! outside the target element (declaration, comments, whitespace, siblings)
//! is passed through untouched when rewriting.

use quick_xml::{
    events::{BytesEnd, BytesText, Event},
    Reader, Writer,
};

/// Structural problems with a preferences document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Tokenizer or writer failure.
    #[error("{0}")]
    Syntax(#[from] quick_xml::Error),
    /// No element at all.
    #[error("document has no root element")]
    NoRoot,
    /// End of input reached with elements still open.
    #[error("document ended with unclosed elements")]
    Truncated,
    /// Text or a second element outside the root element.
    #[error("content outside the root element")]
    ContentOutsideRoot,
}

/// Text content of the first direct child of the root named `element`.
///
/// Returns `Ok(None)` when the element is absent and `Ok(Some(""))` for an
/// empty element.
pub fn read_element(doc: &str, element: &str) -> Result<Option<String>, DocumentError> {
    let mut reader = Reader::from_str(doc);
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut capture: Option<String> = None;
    let mut found: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if depth == 0 {
                    enter_root(&mut seen_root)?;
                } else if depth == 1
                    && found.is_none()
                    && capture.is_none()
                    && e.name().as_ref() == element.as_bytes()
                {
                    capture = Some(String::new());
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    enter_root(&mut seen_root)?;
                } else if depth == 1
                    && found.is_none()
                    && capture.is_none()
                    && e.name().as_ref() == element.as_bytes()
                {
                    found = Some(String::new());
                }
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                if depth == 0 && !text.trim().is_empty() {
                    return Err(DocumentError::ContentOutsideRoot);
                }
                if let Some(buffer) = capture.as_mut().filter(|_| depth == 2) {
                    buffer.push_str(&text);
                }
            }
            Event::CData(e) => {
                if depth == 0 {
                    return Err(DocumentError::ContentOutsideRoot);
                }
                if let Some(buffer) = capture.as_mut().filter(|_| depth == 2) {
                    buffer.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 1 && capture.is_some() {
                    found = capture.take();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(DocumentError::NoRoot);
    }
    if depth != 0 {
        return Err(DocumentError::Truncated);
    }
    Ok(found)
}

/// Re-serialise `doc` with the text of the first top-level `element` set to `value`.
///
/// Returns `Ok(None)` when the element is absent; it is never created.
pub fn replace_element_text(
    doc: &str,
    element: &str,
    value: &str,
) -> Result<Option<Vec<u8>>, DocumentError> {
    let mut reader = Reader::from_str(doc);
    let mut writer = Writer::new(Vec::with_capacity(doc.len() + value.len()));
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut in_target = false;
    let mut replaced = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if depth == 0 {
                    enter_root(&mut seen_root)?;
                }
                let is_target =
                    depth == 1 && !replaced && e.name().as_ref() == element.as_bytes();
                depth += 1;
                writer.write_event(Event::Start(e))?;
                if is_target {
                    writer.write_event(Event::Text(BytesText::new(value)))?;
                    in_target = true;
                    replaced = true;
                }
            }
            Event::Empty(e) => {
                if depth == 0 {
                    enter_root(&mut seen_root)?;
                }
                if depth == 1 && !replaced && e.name().as_ref() == element.as_bytes() {
                    let end = BytesEnd::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    writer.write_event(Event::Start(e))?;
                    writer.write_event(Event::Text(BytesText::new(value)))?;
                    writer.write_event(Event::End(end))?;
                    replaced = true;
                } else {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::Text(e) => {
                let stray = depth == 0 && !e.unescape()?.trim().is_empty();
                if stray {
                    return Err(DocumentError::ContentOutsideRoot);
                }
                if !(in_target && depth == 2) {
                    writer.write_event(Event::Text(e))?;
                }
            }
            Event::CData(e) => {
                if depth == 0 {
                    return Err(DocumentError::ContentOutsideRoot);
                }
                if !(in_target && depth == 2) {
                    writer.write_event(Event::CData(e))?;
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if in_target && depth == 1 {
                    in_target = false;
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
    }

    if !seen_root {
        return Err(DocumentError::NoRoot);
    }
    if depth != 0 {
        return Err(DocumentError::Truncated);
    }
    Ok(replaced.then(|| writer.into_inner()))
}

/// Mark the root as seen, rejecting a second top-level element.
fn enter_root(seen_root: &mut bool) -> Result<(), DocumentError> {
    if *seen_root {
        return Err(DocumentError::ContentOutsideRoot);
    }
    *seen_root = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ZWIFT>
    <!-- user settings -->
    <SOUND>1</SOUND>
    <WORLD>2</WORLD>
    <CONFIG><WORLD>99</WORLD></CONFIG>
</ZWIFT>
"#;

    #[test]
    fn reads_top_level_element_only() -> Result<(), DocumentError> {
        assert_eq!(read_element(DOC, "WORLD")?.as_deref(), Some("2"));
        assert_eq!(read_element(DOC, "MISSING")?, None);
        Ok(())
    }

    #[test]
    fn replacement_preserves_everything_else() -> Result<(), DocumentError> {
        let updated = replace_element_text(DOC, "WORLD", "13")?.expect("element present");
        let updated = String::from_utf8(updated).expect("utf-8 output");
        assert_eq!(updated, DOC.replace("<WORLD>2</WORLD>", "<WORLD>13</WORLD>"));
        Ok(())
    }

    #[test]
    fn absent_element_is_not_synthesised() -> Result<(), DocumentError> {
        assert!(replace_element_text("<ZWIFT><SOUND>1</SOUND></ZWIFT>", "WORLD", "3")?.is_none());
        Ok(())
    }

    #[test]
    fn empty_element_counts_as_present() -> Result<(), DocumentError> {
        let doc = "<ZWIFT><WORLD/></ZWIFT>";
        assert_eq!(read_element(doc, "WORLD")?.as_deref(), Some(""));
        let updated = replace_element_text(doc, "WORLD", "5")?.expect("element present");
        assert_eq!(updated, b"<ZWIFT><WORLD>5</WORLD></ZWIFT>".to_vec());
        Ok(())
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(read_element("<ZWIFT><WORLD>2</ZWIFT>", "WORLD").is_err());
        assert!(matches!(
            read_element("<ZWIFT><WORLD>2</WORLD>", "WORLD"),
            Err(DocumentError::Truncated)
        ));
        assert!(matches!(
            read_element("<!-- nothing here -->", "WORLD"),
            Err(DocumentError::NoRoot)
        ));
        assert!(matches!(
            read_element("just some text", "WORLD"),
            Err(DocumentError::ContentOutsideRoot)
        ));
        assert!(replace_element_text("<ZWIFT><WORLD>2</ZWIFT>", "WORLD", "3").is_err());
    }

    #[test]
    fn content_outside_root_is_rejected() {
        for doc in [
            "<ZWIFT><WORLD>2</WORLD></ZWIFT>this is not xml",
            "<ZWIFT><WORLD>2</WORLD></ZWIFT><ZWIFT><WORLD>3</WORLD></ZWIFT>",
            "<ZWIFT><WORLD>2</WORLD></ZWIFT><EXTRA/>",
            "<ZWIFT><WORLD>2</WORLD></ZWIFT><![CDATA[x]]>",
        ] {
            assert!(
                matches!(read_element(doc, "WORLD"), Err(DocumentError::ContentOutsideRoot)),
                "read accepted {doc:?}"
            );
            assert!(
                matches!(
                    replace_element_text(doc, "WORLD", "5"),
                    Err(DocumentError::ContentOutsideRoot)
                ),
                "rewrite accepted {doc:?}"
            );
        }
    }

    #[test]
    fn undefined_entities_anywhere_are_rejected() {
        let doc = "<ZWIFT><NAME>&bogus;</NAME><WORLD>2</WORLD></ZWIFT>";
        assert!(matches!(read_element(doc, "WORLD"), Err(DocumentError::Syntax(_))));
        assert!(matches!(
            replace_element_text(doc, "WORLD", "5"),
            Err(DocumentError::Syntax(_))
        ));
    }

    #[test]
    fn surrounding_whitespace_is_allowed() -> Result<(), DocumentError> {
        let doc = "\n  <ZWIFT><WORLD>2</WORLD></ZWIFT>\n\n";
        assert_eq!(read_element(doc, "WORLD")?.as_deref(), Some("2"));
        let updated = replace_element_text(doc, "WORLD", "4")?.expect("element present");
        assert_eq!(updated, b"\n  <ZWIFT><WORLD>4</WORLD></ZWIFT>\n\n".to_vec());
        Ok(())
    }
}
