//! Persisted template vocabulary.
//!
//! Plain-text format, one block per template:
//! ```text
//! template 0 2
//! 0 0
//! 0.5 0.1
//! template 1 2
//! 0 0
//! ```
//! A header line `template <index> <dimensions>` is followed by one line per
//! frame, each value followed by a space. Values are written with Rust's
//! shortest round-trip formatting, so reading back yields identical floats.
//! Reading is token based: line breaks inside a block are not significant.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::gesture::GestureTemplate;
use crate::templates::TemplateStore;
use crate::{Error, Result};

const HEADER: &str = "template";

/// Write every template of `store` to `writer`.
pub fn write_templates<W: Write>(writer: &mut W, store: &TemplateStore) -> Result<()> {
    for (index, template) in store.templates().iter().enumerate() {
        writeln!(writer, "{} {} {}", HEADER, index, template.dimensions())?;
        for frame in template.frames() {
            for value in frame.iter() {
                write!(writer, "{} ", value)?;
            }
            writeln!(writer)?;
        }
    }
    Ok(())
}

/// Read templates from `reader`.
///
/// Frames are re-based on each template's first frame, exactly as when
/// recording. Header indices are parsed but templates are returned in file
/// order. A header without frames yields no template.
pub fn read_templates<R: BufRead>(reader: R) -> Result<Vec<GestureTemplate>> {
    let mut templates = Vec::new();
    let mut current: Option<GestureTemplate> = None;
    let mut frame: Vec<f64> = Vec::new();
    let mut last_line = 0;

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = number + 1;
        last_line = line_number;
        let mut tokens = line.split_whitespace();

        while let Some(token) = tokens.next() {
            if token == HEADER {
                finish_template(&mut templates, current.take(), &frame, line_number)?;
                frame.clear();

                let _index: usize = parse_token(tokens.next(), "template index", line_number)?;
                let dimensions: usize = parse_token(tokens.next(), "template dimensions", line_number)?;
                if dimensions == 0 {
                    return Err(Error::Parse {
                        line: line_number,
                        message: "template dimensions must be positive".to_string(),
                    });
                }
                current = Some(GestureTemplate::new(dimensions));
                continue;
            }

            let Some(template) = current.as_mut() else {
                return Err(Error::Parse {
                    line: line_number,
                    message: format!("value '{}' before any template header", token),
                });
            };
            let value: f64 = parse_token(Some(token), "frame value", line_number)?;
            frame.push(value);
            if frame.len() == template.dimensions() {
                template.push(&frame)?;
                frame.clear();
            }
        }
    }

    finish_template(&mut templates, current, &frame, last_line)?;
    Ok(templates)
}

fn finish_template(
    templates: &mut Vec<GestureTemplate>,
    template: Option<GestureTemplate>,
    pending: &[f64],
    line: usize,
) -> Result<()> {
    if !pending.is_empty() {
        return Err(Error::Parse {
            line,
            message: format!("incomplete frame with {} values", pending.len()),
        });
    }
    if let Some(template) = template {
        if !template.is_empty() {
            templates.push(template);
        }
    }
    Ok(())
}

fn parse_token<T: std::str::FromStr>(token: Option<&str>, what: &str, line: usize) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let token = token.ok_or_else(|| Error::Parse {
        line,
        message: format!("missing {}", what),
    })?;
    token.parse().map_err(|e| Error::Parse {
        line,
        message: format!("invalid {} '{}': {}", what, token, e),
    })
}

/// Write the vocabulary to a file, replacing it if it exists.
pub fn save_templates<P: AsRef<Path>>(path: P, store: &TemplateStore) -> Result<()> {
    let display = path.as_ref().display().to_string();
    let file = File::create(&path).map_err(|e| {
        Error::IoError(std::io::Error::new(
            e.kind(),
            format!("failed to create template file '{}': {}", display, e),
        ))
    })?;
    let mut writer = BufWriter::new(file);
    write_templates(&mut writer, store)?;
    writer.flush()?;
    Ok(())
}

/// Read templates from a file.
pub fn load_templates<P: AsRef<Path>>(path: P) -> Result<Vec<GestureTemplate>> {
    let display = path.as_ref().display().to_string();
    let file = File::open(&path).map_err(|e| {
        Error::IoError(std::io::Error::new(
            e.kind(),
            format!("failed to open template file '{}': {}", display, e),
        ))
    })?;
    read_templates(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn store() -> TemplateStore {
        let mut store = TemplateStore::new();
        store
            .add(GestureTemplate::from_frames(&[[1.0, 1.0], [1.5, 1.25], [2.0, 0.1]]).unwrap())
            .unwrap();
        store
            .add(GestureTemplate::from_frames(&[[0.0, 0.0], [-0.3, 1.0 / 3.0]]).unwrap())
            .unwrap();
        store
    }

    #[test]
    fn test_write_format() {
        let mut store = TemplateStore::new();
        store
            .add(GestureTemplate::from_frames(&[[2.0, 3.0], [2.5, 3.0]]).unwrap())
            .unwrap();

        let mut out = Vec::new();
        write_templates(&mut out, &store).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "template 0 2\n0 0 \n0.5 0 \n");
    }

    #[test]
    fn test_round_trip_is_exact() {
        let store = store();
        let mut out = Vec::new();
        write_templates(&mut out, &store).unwrap();

        let loaded = read_templates(Cursor::new(out)).unwrap();
        assert_eq!(loaded.len(), 2);
        for (original, loaded) in store.templates().iter().zip(&loaded) {
            assert_eq!(original.frames(), loaded.frames());
        }
    }

    #[test]
    fn test_read_rebases_on_first_frame() {
        let text = "template 0 2\n10 20 \n11 22 \n";
        let loaded = read_templates(Cursor::new(text)).unwrap();
        assert_eq!(loaded[0].frame(0).unwrap().as_slice(), &[0.0, 0.0]);
        assert_eq!(loaded[0].frame(1).unwrap().as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn test_read_ignores_line_layout() {
        let text = "template 0 3 0 0 0\n1 2\n3\n\ntemplate 1 3\n";
        let loaded = read_templates(Cursor::new(text)).unwrap();
        // trailing header without frames yields nothing
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].len(), 2);
        assert_eq!(loaded[0].frame(1).unwrap().as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_read_errors() {
        let err = read_templates(Cursor::new("1 2\n")).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));

        let err = read_templates(Cursor::new("template 0 2\n0 0\n1 x\n")).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 3, .. }));

        let err = read_templates(Cursor::new("template 0 2\n0 0\n1\n")).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 3, .. }));

        let err = read_templates(Cursor::new("template 0\n")).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));

        let err = read_templates(Cursor::new("template 0 0\n")).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocabulary.txt");
        let store = store();

        save_templates(&path, &store).unwrap();
        let loaded = load_templates(&path).unwrap();
        assert_eq!(loaded.len(), store.len());
        assert_eq!(loaded[1].frames(), store.templates()[1].frames());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_templates(dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
    }
}
