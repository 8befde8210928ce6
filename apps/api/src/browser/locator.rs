use std::fmt;

/// How a form control is found on the page. Parsed from a descriptor's selector hint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
    Id(String),
    Name(String),
}

impl Locator {
    /// `css=`, `xpath=`, `id=` and `name=` prefixes pick the strategy. Unprefixed
    /// hints starting with `/` or `(` are XPath, everything else is a CSS selector.
    pub fn parse(hint: &str) -> Locator {
        let hint = hint.trim();
        if let Some(rest) = hint.strip_prefix("css=") {
            return Locator::Css(rest.trim().to_string());
        }
        if let Some(rest) = hint.strip_prefix("xpath=") {
            return Locator::XPath(rest.trim().to_string());
        }
        if let Some(rest) = hint.strip_prefix("id=") {
            return Locator::Id(rest.trim().to_string());
        }
        if let Some(rest) = hint.strip_prefix("name=") {
            return Locator::Name(rest.trim().to_string());
        }
        if hint.starts_with('/') || hint.starts_with('(') {
            return Locator::XPath(hint.to_string());
        }
        Locator::Css(hint.to_string())
    }

    pub fn value(&self) -> &str {
        match self {
            Locator::Css(v) | Locator::XPath(v) | Locator::Id(v) | Locator::Name(v) => v,
        }
    }

    /// W3C WebDriver `(using, value)` pair. Id and name become attribute selectors.
    pub fn webdriver_query(&self) -> (&'static str, String) {
        let value = self.value();
        match self {
            Locator::Css(_) => ("css selector", value.to_string()),
            Locator::XPath(_) => ("xpath", value.to_string()),
            Locator::Id(_) => ("css selector", format!("[id=\"{}\"]", escape_attr(value))),
            Locator::Name(_) => ("css selector", format!("[name=\"{}\"]", escape_attr(value))),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(v) => write!(f, "css={v}"),
            Locator::XPath(v) => write!(f, "xpath={v}"),
            Locator::Id(v) => write!(f, "id={v}"),
            Locator::Name(v) => write!(f, "name={v}"),
        }
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixes() {
        assert_eq!(Locator::parse("id=email"), Locator::Id("email".to_string()));
        assert_eq!(Locator::parse("name= phone"), Locator::Name("phone".to_string()));
        assert_eq!(
            Locator::parse("xpath=//input[@id='a']"),
            Locator::XPath("//input[@id='a']".to_string())
        );
        assert_eq!(Locator::parse("css=#a .b"), Locator::Css("#a .b".to_string()));
    }

    #[test]
    fn test_unprefixed_hints() {
        assert_eq!(Locator::parse("#resume"), Locator::Css("#resume".to_string()));
        assert_eq!(
            Locator::parse("//textarea"),
            Locator::XPath("//textarea".to_string())
        );
    }

    #[test]
    fn test_webdriver_query_escapes_attribute_values() {
        let (using, value) = Locator::Name("q\"1".to_string()).webdriver_query();
        assert_eq!(using, "css selector");
        assert_eq!(value, "[name=\"q\\\"1\"]");
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let locator = Locator::Id("first_name".to_string());
        assert_eq!(Locator::parse(&locator.to_string()), locator);
    }
}
