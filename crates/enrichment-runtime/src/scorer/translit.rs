//! Cyrillic→Latin transliteration and a light Russian stemmer, used to
//! normalise entity text for cross-language matching.

use phf::phf_map;

static CYRILLIC_TO_LATIN: phf::Map<char, &'static str> = phf_map! {
    'а' => "a", 'б' => "b", 'в' => "v", 'г' => "g", 'д' => "d",
    'е' => "e", 'ё' => "e", 'ж' => "zh", 'з' => "z", 'и' => "i",
    'й' => "i", 'к' => "k", 'л' => "l", 'м' => "m", 'н' => "n",
    'о' => "o", 'п' => "p", 'р' => "r", 'с' => "s", 'т' => "t",
    'у' => "u", 'ф' => "f", 'х' => "kh", 'ц' => "ts", 'ч' => "ch",
    'ш' => "sh", 'щ' => "shch", 'ъ' => "", 'ы' => "y", 'ь' => "",
    'э' => "e", 'ю' => "yu", 'я' => "ya", 'і' => "i", 'ї' => "yi",
    'є' => "ye", 'ґ' => "g",
};

static RUSSIAN_SUFFIXES: &[&str] = &[
    "ского", "ской", "ому", "его", "ыми", "ими", "ами", "ями",
    "ов", "ев", "ин", "ын", "ая", "яя", "ое", "ее", "ий", "ый", "ой",
    "а", "я", "о", "е", "ы", "и", "у", "ю",
];

/// Lowercases, strips combining marks, normalises `ё→е`, and
/// transliterates remaining Cyrillic letters to Latin.
pub fn transliterate(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.to_lowercase().chars() {
        if is_combining_mark(ch) {
            continue;
        }
        let normalized = if ch == 'ё' { 'е' } else { ch };
        if let Some(latin) = CYRILLIC_TO_LATIN.get(&normalized) {
            out.push_str(latin);
        } else {
            out.push(normalized);
        }
    }
    out
}

fn is_combining_mark(ch: char) -> bool {
    matches!(ch as u32, 0x0300..=0x036F)
}

/// Strips a known Russian inflectional suffix if the remaining stem is
/// still at least 3 characters. Applied only to Cyrillic-dominant
/// tokens by the caller.
pub fn stem_russian(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    for suffix in RUSSIAN_SUFFIXES {
        let suffix_chars: Vec<char> = suffix.chars().collect();
        if chars.len() > suffix_chars.len() + 2 && chars.ends_with(&suffix_chars) {
            return chars[..chars.len() - suffix_chars.len()].iter().collect();
        }
    }
    token.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transliterates_putin_consistently() {
        assert_eq!(transliterate("Путин"), "putin");
        assert_eq!(transliterate("Владимир Путин"), "vladimir putin");
    }

    #[test]
    fn normalize_matches_translated_forms() {
        assert_eq!(transliterate("Владимир Путин"), transliterate("Vladimir Putin"));
    }

    #[test]
    fn stems_genitive_suffix() {
        assert_eq!(stem_russian("москвы"), "москв");
    }

    #[test]
    fn leaves_short_stems_untouched() {
        assert_eq!(stem_russian("она"), "она");
    }
}
