//! The SQL keyword table (spec §4.3). Matching is always case-insensitive.

use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive, serialize_all = "UPPERCASE")]
pub enum Keyword {
    Select,
    From,
    Where,
    Order,
    By,
    Group,
    Having,
    Top,
    Perc,
    Distinct,
    Into,
    Union,
    All,
    Case,
    When,
    Then,
    Else,
    End,
    Is,
    Not,
    Null,
    Like,
    Match,
    And,
    Or,
    In,
    Between,
    As,
    Create,
    Table,
    Drop,
    Truncate,
    Alter,
    Add,
    Column,
    Insert,
    Values,
    Update,
    Set,
    Delete,
    Import,
    Show,
    Tables,
    Check,
    Constraint,
    Unique,
    Default,
    Primary,
    Key,
    Foreign,
    References,
    #[strum(serialize = "AUTO_INCREMENT")]
    AutoIncrement,
    Engine,
    Asc,
    Desc,
    #[strum(serialize = "TRUE")]
    True,
    #[strum(serialize = "FALSE")]
    False,
    Join,
    Inner,
    Left,
    Right,
    Outer,
    Full,
    On,
    Cross,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn keyword_matching_is_case_insensitive() {
        assert_eq!(Keyword::from_str("select").unwrap(), Keyword::Select);
        assert_eq!(Keyword::from_str("SeLeCt").unwrap(), Keyword::Select);
        assert_eq!(Keyword::from_str("auto_increment").unwrap(), Keyword::AutoIncrement);
    }

    #[test]
    fn non_keyword_identifier_does_not_match() {
        assert!(Keyword::from_str("customers").is_err());
    }
}
