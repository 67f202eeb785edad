use metrics::Key;

/// Renders `key` as `name` or `name{label="value",...}` in label order.
pub(crate) fn to_string(key: &Key) -> String {
    let mut labels = key.labels().peekable();
    if labels.peek().is_none() {
        return key.name().to_owned();
    }

    let labels = labels
        .map(|label| format!(r#"{}="{}""#, label.key(), label.value()))
        .collect::<Vec<String>>();

    format!("{}{{{}}}", key.name(), labels.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::Label;

    #[test]
    fn test_plain_name() {
        assert_eq!(to_string(&Key::from_name("requests")), "requests");
    }

    #[test]
    fn test_labels_keep_order() {
        let key = Key::from_parts(
            "requests",
            vec![Label::new("method", "GET"), Label::new("code", "200")],
        );

        assert_eq!(to_string(&key), r#"requests{method="GET",code="200"}"#);
    }
}
