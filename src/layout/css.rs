//! Just enough CSS reading to find the declared size of the layout root.

use crate::layout::ViewportSize;

const ROOT_SELECTOR: &str = "#main";

pub fn root_size(source: &str) -> Option<ViewportSize> {
    let source = strip_comments(source);
    let mut rest = source.as_str();

    while let Some(open) = rest.find('{') {
        let selectors = &rest[..open];
        let close = open + rest[open..].find('}')?;
        let body = &rest[open + 1..close];
        rest = &rest[close + 1..];

        let is_root = selectors
            .split(',')
            .any(|s| s.trim() == ROOT_SELECTOR);
        if !is_root {
            continue;
        }
        let width = property(body, "width").and_then(leading_int);
        let height = property(body, "height").and_then(leading_int);
        if let (Some(width), Some(height)) = (width, height) {
            return Some(ViewportSize { width, height });
        }
    }
    None
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

fn property<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    body.split(';').find_map(|decl| {
        let (key, value) = decl.split_once(':')?;
        (key.trim() == name).then(|| value.trim())
    })
}

/// Leading integer of a length, `"800px"` -> 800.
fn leading_int(value: &str) -> Option<u32> {
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
