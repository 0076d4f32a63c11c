//! Ordered manifest stream

use std::fmt::Write as _;

use crate::objects::RenderedObject;

/// Header comment preceding each object in the stream
pub fn header(object: &RenderedObject) -> String {
    format!("# {}", object.display_name())
}

/// `---`, a header comment and the body for every object, in order
pub fn to_stream(objects: &[RenderedObject]) -> String {
    let mut out = String::new();
    for object in objects {
        // Writing to a String cannot fail
        let _ = writeln!(out, "---\n{}\n{}", header(object), object.content.trim_end());
    }
    out
}

/// Split a stream back into its bodies, headers dropped
pub fn split_stream(stream: &str) -> Vec<String> {
    crate::objects::split_documents(stream)
        .into_iter()
        .map(|doc| {
            doc.lines()
                .skip_while(|l| l.starts_with("# "))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect()
}
