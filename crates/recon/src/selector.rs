use std::fmt;
use std::str::FromStr;

/// Investigation identifier given on the command line: `name` or
/// `name:visitId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvestigationSelector {
    pub name: String,
    pub visit_id: Option<String>,
}

impl FromStr for InvestigationSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, visit_id) = match s.split_once(':') {
            Some((name, visit)) => (name, Some(visit)),
            None => (s, None),
        };
        if name.is_empty() {
            return Err(format!("invalid investigation '{s}': empty name"));
        }
        if visit_id == Some("") {
            return Err(format!("invalid investigation '{s}': empty visit id"));
        }
        Ok(Self {
            name: name.to_string(),
            visit_id: visit_id.map(String::from),
        })
    }
}

impl fmt::Display for InvestigationSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.visit_id {
            Some(v) => write!(f, "{}:{}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_only() {
        let sel: InvestigationSelector = "12100409-ST".parse().unwrap();
        assert_eq!(sel.name, "12100409-ST");
        assert_eq!(sel.visit_id, None);
        assert_eq!(sel.to_string(), "12100409-ST");
    }

    #[test]
    fn name_and_visit() {
        let sel: InvestigationSelector = "12100409-ST:1.1-P".parse().unwrap();
        assert_eq!(sel.name, "12100409-ST");
        assert_eq!(sel.visit_id.as_deref(), Some("1.1-P"));
        assert_eq!(sel.to_string(), "12100409-ST:1.1-P");
    }

    #[test]
    fn rejects_empty_parts() {
        assert!("".parse::<InvestigationSelector>().is_err());
        assert!(":1".parse::<InvestigationSelector>().is_err());
        assert!("inv:".parse::<InvestigationSelector>().is_err());
    }
}
