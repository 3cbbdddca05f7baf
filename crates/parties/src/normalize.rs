//! Company-name normalization (the company natural key).
//!
//! Two names denote the same company when their normalized forms are equal:
//! case folded, whitespace collapsed, parenthetical text removed, and common
//! legal-entity suffixes stripped.

/// CJK legal suffixes, longest first. Removed wherever they occur.
const CJK_SUFFIXES: &[&str] = &["股份有限公司", "有限公司", "公司"];

/// Latin legal suffixes. Stripped only as trailing whole words.
const LATIN_SUFFIXES: &[&str] = &[
    "co",
    "company",
    "corp",
    "corporation",
    "gmbh",
    "inc",
    "incorporated",
    "limited",
    "llc",
    "ltd",
    "plc",
];

const OPEN_PARENS: &[char] = &['(', '（'];
const CLOSE_PARENS: &[char] = &[')', '）'];

/// Normalized natural key of a company name.
pub fn normalize_company_name(name: &str) -> String {
    let mut current = name.to_lowercase();
    loop {
        let next = normalize_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Whether two names resolve to the same company.
pub fn same_company(a: &str, b: &str) -> bool {
    let a = normalize_company_name(a);
    !a.is_empty() && a == normalize_company_name(b)
}

fn normalize_pass(input: &str) -> String {
    let mut text = strip_parenthetical(input);
    for suffix in CJK_SUFFIXES {
        text = text.replace(suffix, "");
    }
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    strip_latin_suffix(&collapsed)
}

/// Remove everything from the first opening to the last closing parenthesis.
fn strip_parenthetical(input: &str) -> String {
    let Some(open) = input.find(OPEN_PARENS) else {
        return input.to_string();
    };
    match input.rfind(CLOSE_PARENS) {
        Some(close) if close > open => {
            let close_len = input[close..].chars().next().map_or(1, char::len_utf8);
            format!("{}{}", &input[..open], &input[close + close_len..])
        }
        _ => input.to_string(),
    }
}

fn strip_latin_suffix(input: &str) -> String {
    let trimmed = input.trim_end_matches(|c: char| c == '.' || c == ',' || c.is_whitespace());
    for suffix in LATIN_SUFFIXES {
        if let Some(head) = trimmed.strip_suffix(suffix) {
            let at_word_boundary = head
                .chars()
                .last()
                .is_some_and(|c| c == ' ' || c == ',' || c == '.');
            let rest = head.trim_end_matches(|c: char| c == '.' || c == ',' || c.is_whitespace());
            if at_word_boundary && !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    trimmed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn folds_case_and_whitespace() {
        assert_eq!(normalize_company_name("  ACME   Widgets "), "acme widgets");
    }

    #[test]
    fn strips_latin_legal_suffixes() {
        assert_eq!(normalize_company_name("Acme Co., Ltd."), "acme");
        assert_eq!(normalize_company_name("Acme Inc"), "acme");
        assert_eq!(normalize_company_name("Acme, LLC"), "acme");
        assert_eq!(normalize_company_name("Acme Corporation"), "acme");
    }

    #[test]
    fn keeps_suffix_lookalikes_inside_words() {
        assert_eq!(normalize_company_name("Incubator Labs"), "incubator labs");
        assert_eq!(normalize_company_name("Tesco"), "tesco");
        assert_eq!(normalize_company_name("Limited"), "limited");
    }

    #[test]
    fn strips_cjk_suffixes() {
        assert_eq!(normalize_company_name("台灣精密股份有限公司"), "台灣精密");
        assert_eq!(normalize_company_name("台灣精密有限公司"), "台灣精密");
        assert_eq!(normalize_company_name("台灣精密公司"), "台灣精密");
    }

    #[test]
    fn strips_parenthetical_text() {
        assert_eq!(normalize_company_name("Acme (Taiwan Branch)"), "acme");
        assert_eq!(normalize_company_name("台灣精密（新竹廠）有限公司"), "台灣精密");
        assert_eq!(normalize_company_name("Acme (unclosed"), "acme (unclosed");
    }

    #[test]
    fn same_company_matches_variants_but_not_blank() {
        assert!(same_company("ACME Co., Ltd.", "acme"));
        assert!(same_company("Acme (HQ)", "  acme inc "));
        assert!(!same_company("Acme", "Acme Widgets"));
        assert!(!same_company("", "  "));
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(name in "[A-Za-z ().,]{0,24}") {
            let once = normalize_company_name(&name);
            prop_assert_eq!(normalize_company_name(&once), once);
        }

        #[test]
        fn normalization_ignores_case_and_padding(name in "[A-Za-z ().,]{0,24}") {
            let padded = format!("  {}  ", name.to_uppercase());
            prop_assert_eq!(normalize_company_name(&padded), normalize_company_name(&name));
        }
    }
}
