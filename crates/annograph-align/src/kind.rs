//! Comparators selectable by name.

use std::{fmt, str::FromStr};

use crate::{
    comparator::{DefaultComparator, EditComparator, NormalizedTranslator, TranslatingComparator},
    error::ComparatorError,
    weighted::{
        ArpabetToDiscComparator, CharComparator, DiscComparator, DiscToArpabetComparator,
        IpaComparator, LabelSplit, OrthographyComparator, OrthographyToArpabetComparator,
        OrthographyToDiscComparator, PerChar, PerToken,
    },
};

/// A label comparator that can be shared between worker threads.
pub type LabelComparator = Box<dyn EditComparator<String> + Send + Sync>;

/// The label comparators available to configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ComparatorKind {
    /// Exact label equality.
    #[default]
    Default,
    /// Equality after lower-casing and dropping non-letters on both sides.
    Normalized,
    OrthographyToOrthography,
    CharToChar,
    DiscToDisc,
    OrthographyToDisc,
    /// Letters against space-separated ARPAbet phones.
    OrthographyToArpabet,
    /// DISC phonemes against space-separated ARPAbet phones.
    DiscToArpabet,
    ArpabetToDisc,
    /// Space-separated IPA phones on both sides.
    IpaToIpa,
}

impl ComparatorKind {
    pub const ALL: [Self; 10] = [
        Self::Default,
        Self::Normalized,
        Self::OrthographyToOrthography,
        Self::CharToChar,
        Self::DiscToDisc,
        Self::OrthographyToDisc,
        Self::OrthographyToArpabet,
        Self::DiscToArpabet,
        Self::ArpabetToDisc,
        Self::IpaToIpa,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Normalized => "Normalized",
            Self::OrthographyToOrthography => "OrthographyToOrthography",
            Self::CharToChar => "CharToChar",
            Self::DiscToDisc => "DISCToDISC",
            Self::OrthographyToDisc => "OrthographyToDISC",
            Self::OrthographyToArpabet => "OrthographyToArpabet",
            Self::DiscToArpabet => "DISCToArpabet",
            Self::ArpabetToDisc => "ArpabetToDISC",
            Self::IpaToIpa => "IPAToIPA",
        }
    }

    /// Builds the comparator.
    pub fn build(self) -> LabelComparator {
        match self {
            Self::Default => Box::new(DefaultComparator),
            Self::Normalized => Box::new(
                TranslatingComparator::new(NormalizedTranslator, DefaultComparator)
                    .with_translated_target(),
            ),
            Self::OrthographyToOrthography => Box::new(OrthographyComparator),
            Self::CharToChar => Box::new(PerChar::new(CharComparator)),
            Self::DiscToDisc => Box::new(PerChar::new(DiscComparator)),
            Self::OrthographyToDisc => Box::new(PerChar::new(OrthographyToDiscComparator)),
            Self::OrthographyToArpabet => Box::new(PerToken::new(
                OrthographyToArpabetComparator,
                LabelSplit::Chars,
                LabelSplit::Spaces,
            )),
            Self::DiscToArpabet => Box::new(PerToken::new(
                DiscToArpabetComparator,
                LabelSplit::Chars,
                LabelSplit::Spaces,
            )),
            Self::ArpabetToDisc => Box::new(PerToken::new(
                ArpabetToDiscComparator,
                LabelSplit::Spaces,
                LabelSplit::Chars,
            )),
            Self::IpaToIpa => Box::new(PerToken::new(
                IpaComparator,
                LabelSplit::Spaces,
                LabelSplit::Spaces,
            )),
        }
    }
}

impl fmt::Display for ComparatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComparatorKind {
    type Err = ComparatorError;

    /// Parses a comparator name, ignoring case. `2` may stand for `To`, as
    /// in `Orthography2DISC`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('2', "to");
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| ComparatorError::Unknown(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("default".parse(), Ok(ComparatorKind::Default));
        assert_eq!("DISCToDISC".parse(), Ok(ComparatorKind::DiscToDisc));
        assert_eq!(
            "Orthography2DISC".parse(),
            Ok(ComparatorKind::OrthographyToDisc)
        );
        assert_eq!(
            " chartochar ".parse(),
            Ok(ComparatorKind::CharToChar)
        );
        assert_eq!("IPA2IPA".parse(), Ok(ComparatorKind::IpaToIpa));
        assert_eq!(
            "DISC2ARPAbet".parse(),
            Ok(ComparatorKind::DiscToArpabet)
        );
        assert_eq!(
            "Soundex".parse::<ComparatorKind>(),
            Err(ComparatorError::Unknown("Soundex".to_string()))
        );
    }

    #[test]
    fn test_names_round_trip() {
        for kind in ComparatorKind::ALL {
            assert_eq!(kind.to_string().parse(), Ok(kind));
        }
    }

    #[test]
    fn test_built_comparators() {
        let normalized = ComparatorKind::Normalized.build();
        assert!(
            normalized
                .compare(&"Hello!".to_string(), &"hello".to_string())
                .is_equal()
        );

        let disc = ComparatorKind::OrthographyToDisc.build();
        assert!(!disc.compare(&"cat".to_string(), &"k{t".to_string()).is_equal());
        assert_eq!(disc.delete_cost(&"k{t".to_string()), 30);
    }

    #[test]
    fn test_built_phone_comparators() {
        let arpabet = ComparatorKind::OrthographyToArpabet.build();
        let cat = "cat".to_string();
        assert!(
            arpabet.compare(&cat, &"K AE1 T".to_string()).distance()
                < arpabet.compare(&cat, &"D AO1 G".to_string()).distance()
        );

        let to_disc = ComparatorKind::ArpabetToDisc.build();
        assert!(to_disc.compare(&"K AE1 T".to_string(), &"k{t".to_string()).is_equal());
        assert_eq!(to_disc.delete_cost(&"K AE1 T".to_string()), 30);

        let ipa = ComparatorKind::IpaToIpa.build();
        assert!(ipa.compare(&"k æ t".to_string(), &"k æ t".to_string()).is_equal());
        assert_eq!(ipa.compare(&"k æ t".to_string(), &"k æ d".to_string()).distance(), 5);
    }
}
