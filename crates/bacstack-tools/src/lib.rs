//! Shared helpers for the command-line tools.

use bacstack_core::types::TaggedValue;

/// Parses a command-line value literal.
///
/// A bare literal is inferred: `null`, `true`/`false`, an integer, or a
/// float. A `kind:literal` prefix forces the type, e.g. `real:1`,
/// `unsigned:3`, `enum:2`, `text:hello`.
pub fn parse_value(text: &str) -> Result<TaggedValue, String> {
    if let Some((kind, literal)) = text.split_once(':') {
        return match kind {
            "null" => Ok(TaggedValue::Null),
            "bool" => match literal {
                "true" | "1" => Ok(TaggedValue::Boolean(true)),
                "false" | "0" => Ok(TaggedValue::Boolean(false)),
                other => Err(format!("bad boolean {other:?}")),
            },
            "unsigned" => literal
                .parse()
                .map(TaggedValue::Unsigned)
                .map_err(|e| e.to_string()),
            "signed" => literal
                .parse()
                .map(TaggedValue::Signed)
                .map_err(|e| e.to_string()),
            "real" => literal
                .parse()
                .map(TaggedValue::Real)
                .map_err(|e| e.to_string()),
            "double" => literal
                .parse()
                .map(TaggedValue::Double)
                .map_err(|e| e.to_string()),
            "enum" => literal
                .parse()
                .map(TaggedValue::Enumerated)
                .map_err(|e| e.to_string()),
            "text" => Ok(TaggedValue::CharacterString(literal.to_owned())),
            other => Err(format!("unknown value kind {other:?}")),
        };
    }

    match text {
        "null" => Ok(TaggedValue::Null),
        "true" => Ok(TaggedValue::Boolean(true)),
        "false" => Ok(TaggedValue::Boolean(false)),
        _ => {
            if let Ok(v) = text.parse::<u32>() {
                Ok(TaggedValue::Unsigned(v))
            } else if let Ok(v) = text.parse::<i32>() {
                Ok(TaggedValue::Signed(v))
            } else if let Ok(v) = text.parse::<f32>() {
                Ok(TaggedValue::Real(v))
            } else {
                Ok(TaggedValue::CharacterString(text.to_owned()))
            }
        }
    }
}

/// Renders a value for terminal output.
pub fn format_value(value: &TaggedValue) -> String {
    match value {
        TaggedValue::Null => "null".into(),
        TaggedValue::Boolean(v) => v.to_string(),
        TaggedValue::Unsigned(v) | TaggedValue::Enumerated(v) => v.to_string(),
        TaggedValue::Signed(v) => v.to_string(),
        TaggedValue::Real(v) => v.to_string(),
        TaggedValue::Double(v) => v.to_string(),
        TaggedValue::CharacterString(v) => v.clone(),
        TaggedValue::ObjectId(id) => id.to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_value;
    use bacstack_core::types::TaggedValue;

    #[test]
    fn bare_literals_are_inferred() {
        assert_eq!(parse_value("null").unwrap(), TaggedValue::Null);
        assert_eq!(parse_value("true").unwrap(), TaggedValue::Boolean(true));
        assert_eq!(parse_value("42").unwrap(), TaggedValue::Unsigned(42));
        assert_eq!(parse_value("-7").unwrap(), TaggedValue::Signed(-7));
        assert_eq!(parse_value("1.5").unwrap(), TaggedValue::Real(1.5));
        assert_eq!(
            parse_value("on").unwrap(),
            TaggedValue::CharacterString("on".into())
        );
    }

    #[test]
    fn prefixed_literals_force_the_type() {
        assert_eq!(parse_value("real:1").unwrap(), TaggedValue::Real(1.0));
        assert_eq!(parse_value("enum:2").unwrap(), TaggedValue::Enumerated(2));
        assert_eq!(
            parse_value("text:7").unwrap(),
            TaggedValue::CharacterString("7".into())
        );
        assert!(parse_value("bogus:1").is_err());
    }
}
