//! Character classes for XML names and text.

use super::config::XmlVersion;

pub trait XmlStr {
    /// Find the end of the longest prefix that is a `Name`.
    fn end_of_name(&self, version: XmlVersion) -> Option<usize>;
    /// Find the end of the longest prefix that is an `NCName`.
    fn end_of_ncname(&self, version: XmlVersion) -> Option<usize>;
    fn is_xml_name(&self, version: XmlVersion) -> bool;
    fn is_ncname(&self, version: XmlVersion) -> bool;
    fn is_whitespace_only(&self) -> bool;
    /// The first character that may not appear in a document of this
    /// version.
    fn first_invalid_char(&self, version: XmlVersion) -> Option<char>;
}

impl<'a> XmlStr for &'a str {
    fn end_of_name(&self, version: XmlVersion) -> Option<usize> {
        end_of_start_rest(self, |c| c.is_name_start_char(version), |c| c.is_name_char(version))
    }

    fn end_of_ncname(&self, version: XmlVersion) -> Option<usize> {
        end_of_start_rest(self, |c| c.is_ncname_start_char(version), |c| c.is_ncname_char(version))
    }

    fn is_xml_name(&self, version: XmlVersion) -> bool {
        self.end_of_name(version) == Some(self.len())
    }

    fn is_ncname(&self, version: XmlVersion) -> bool {
        self.end_of_ncname(version) == Some(self.len())
    }

    fn is_whitespace_only(&self) -> bool {
        self.chars().all(|c| c.is_space_char())
    }

    fn first_invalid_char(&self, version: XmlVersion) -> Option<char> {
        self.chars().find(|&c| !c.is_xml_char(version))
    }
}

fn end_of_start_rest<F1, F2>(s: &str, is_first: F1, is_rest: F2) -> Option<usize>
    where F1: Fn(char) -> bool,
          F2: Fn(char) -> bool,
{
    let mut positions = s.char_indices();

    match positions.next() {
        Some((_, c)) if is_first(c) => (),
        _ => return None,
    };

    let mut positions = positions.skip_while(|&(_, c)| is_rest(c));
    match positions.next() {
        Some((offset, _)) => Some(offset),
        None => Some(s.len()),
    }
}

pub trait XmlChar {
    fn is_name_start_char(self, version: XmlVersion) -> bool;
    fn is_name_char(self, version: XmlVersion) -> bool;
    fn is_ncname_start_char(self, version: XmlVersion) -> bool;
    fn is_ncname_char(self, version: XmlVersion) -> bool;
    fn is_space_char(self) -> bool;
    fn is_xml_char(self, version: XmlVersion) -> bool;
}

impl XmlChar for char {
    fn is_name_start_char(self, version: XmlVersion) -> bool {
        self == ':' || self.is_ncname_start_char(version)
    }

    fn is_name_char(self, version: XmlVersion) -> bool {
        self.is_name_start_char(version) || self.is_ncname_char(version)
    }

    fn is_ncname_start_char(self, version: XmlVersion) -> bool {
        // XML 1.0 names are limited to the basic multilingual plane.
        if version == XmlVersion::V1_0 && self > '\u{FFFF}' {
            return false;
        }

        matches!(self,
            'A'..='Z'                   |
            '_'                         |
            'a'..='z'                   |
            '\u{0000C0}'..='\u{0000D6}' |
            '\u{0000D8}'..='\u{0000F6}' |
            '\u{0000F8}'..='\u{0002FF}' |
            '\u{000370}'..='\u{00037D}' |
            '\u{00037F}'..='\u{001FFF}' |
            '\u{00200C}'..='\u{00200D}' |
            '\u{002070}'..='\u{00218F}' |
            '\u{002C00}'..='\u{002FEF}' |
            '\u{003001}'..='\u{00D7FF}' |
            '\u{00F900}'..='\u{00FDCF}' |
            '\u{00FDF0}'..='\u{00FFFD}' |
            '\u{010000}'..='\u{0EFFFF}')
    }

    fn is_ncname_char(self, version: XmlVersion) -> bool {
        if self.is_ncname_start_char(version) { return true; }
        matches!(self,
            '-'                       |
            '.'                       |
            '0'..='9'                 |
            '\u{00B7}'                |
            '\u{0300}'..='\u{036F}'   |
            '\u{203F}'..='\u{2040}')
    }

    fn is_space_char(self) -> bool {
        matches!(self, '\x20' | '\x09' | '\x0D' | '\x0A')
    }

    fn is_xml_char(self, version: XmlVersion) -> bool {
        // XML 1.1 admits the C0 controls, which must then be escaped.
        let controls = match version {
            XmlVersion::V1_0 => self.is_space_char(),
            XmlVersion::V1_1 => self != '\0',
        };
        matches!(self,
            '\u{000020}'..='\u{00D7FF}' |
            '\u{00E000}'..='\u{00FFFD}' |
            '\u{010000}'..='\u{10FFFF}') || (self < '\x20' && controls)
    }
}

#[cfg(test)]
mod test {
    use super::XmlStr;
    use crate::config::XmlVersion::{V1_0, V1_1};

    #[test]
    fn names_may_contain_colons() {
        assert!("a:b".is_xml_name(V1_0));
        assert!(!"a:b".is_ncname(V1_0));
    }

    #[test]
    fn names_cannot_start_with_digits() {
        assert!(!"1abc".is_xml_name(V1_0));
        assert_eq!(None, "1abc".end_of_ncname(V1_0));
    }

    #[test]
    fn ncname_ends_at_first_illegal_character() {
        assert_eq!(Some("hello".len()), "hello world".end_of_ncname(V1_0));
        assert_eq!(Some("pre".len()), "pre:local".end_of_ncname(V1_0));
    }

    #[test]
    fn supplementary_characters_are_only_names_in_xml_1_1() {
        let name = "\u{10000}abc";
        assert!(!name.is_xml_name(V1_0));
        assert!(name.is_xml_name(V1_1));
    }

    #[test]
    fn empty_string_is_not_a_name() {
        assert!(!"".is_xml_name(V1_1));
    }

    #[test]
    fn control_characters_are_only_text_in_xml_1_1() {
        assert_eq!(Some('\u{1}'), "a\u{1}b".first_invalid_char(V1_0));
        assert_eq!(None, "a\u{1}b".first_invalid_char(V1_1));
        assert_eq!(Some('\0'), "\0".first_invalid_char(V1_1));
        assert_eq!(Some('\u{FFFE}'), "\u{FFFE}".first_invalid_char(V1_1));
        assert_eq!(None, "tab\tand\nnewline".first_invalid_char(V1_0));
    }

    #[test]
    fn whitespace_detection() {
        assert!(" \t\r\n".is_whitespace_only());
        assert!(!" a ".is_whitespace_only());
    }
}
