//! English inflections in the style of ActiveSupport, enough for deriving
//! foreign key columns (`users` -> `user_id`) and referenced tables
//! (`t.references :author` -> `authors`).
//!
//! Only the last `_`-separated word is inflected, the way Rails' anchored
//! rules behave on snake_case table names.

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("ox", "oxen"),
    ("move", "moves"),
    ("zombie", "zombies"),
];

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "jeans",
    "police",
    "news",
    "metadata",
];

/// (plural suffix, singular replacement), most specific first
const SINGULAR_RULES: &[(&str, &str)] = &[
    ("quizzes", "quiz"),
    ("matrices", "matrix"),
    ("vertices", "vertex"),
    ("indices", "index"),
    ("aliases", "alias"),
    ("statuses", "status"),
    ("octopi", "octopus"),
    ("viruses", "virus"),
    ("axes", "axis"),
    ("crises", "crisis"),
    ("testes", "testis"),
    ("shoes", "shoe"),
    ("buses", "bus"),
    ("analyses", "analysis"),
    ("databases", "database"),
    ("bases", "basis"),
    ("diagnoses", "diagnosis"),
    ("parentheses", "parenthesis"),
    ("prognoses", "prognosis"),
    ("synopses", "synopsis"),
    ("theses", "thesis"),
    ("movies", "movie"),
    ("tives", "tive"),
    ("hives", "hive"),
    ("xes", "x"),
    ("ches", "ch"),
    ("sses", "ss"),
    ("shes", "sh"),
    ("oes", "o"),
    ("ss", "ss"),
    ("us", "us"),
    ("is", "is"),
];

pub(crate) fn singularize(word: &str) -> String {
    inflect_last_word(word, singularize_word)
}

pub(crate) fn pluralize(word: &str) -> String {
    inflect_last_word(word, pluralize_word)
}

fn inflect_last_word(word: &str, f: fn(&str) -> String) -> String {
    match word.rsplit_once('_') {
        Some((head, last)) if !last.is_empty() => format!("{head}_{}", f(last)),
        _ => f(word),
    }
}

fn singularize_word(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((singular, _)) = IRREGULAR.iter().find(|(_, plural)| *plural == lower) {
        return keep_case(word, singular);
    }
    if IRREGULAR.iter().any(|(singular, _)| *singular == lower) {
        return word.to_string();
    }

    for (suffix, replacement) in SINGULAR_RULES {
        if lower.ends_with(suffix) {
            return replace_suffix(word, suffix.len(), replacement);
        }
    }

    if let Some(stem) = lower.strip_suffix("ies") {
        // categories -> category, but not "series" (uncountable above)
        if stem.ends_with(|c: char| !"aeiouy".contains(c)) || stem.ends_with("qu") {
            return replace_suffix(word, 3, "y");
        }
    }
    if let Some(stem) = lower.strip_suffix("ves") {
        if stem.ends_with(['l', 'r']) {
            return replace_suffix(word, 3, "f");
        }
        if !stem.is_empty() && !stem.ends_with('f') {
            return replace_suffix(word, 3, "fe");
        }
    }
    if lower.len() > 2 && (lower.ends_with("ta") || lower.ends_with("ia")) {
        return replace_suffix(word, 1, "um");
    }
    match lower.strip_suffix('s') {
        Some(_) => word[..word.len() - 1].to_string(),
        None => word.to_string(),
    }
}

fn pluralize_word(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
        return keep_case(word, plural);
    }
    if IRREGULAR.iter().any(|(_, plural)| *plural == lower) {
        return word.to_string();
    }

    if lower.ends_with("quiz") {
        return format!("{word}zes");
    }
    for (suffix, plural) in [("matrix", "matrices"), ("vertex", "vertices"), ("index", "indices")] {
        if lower.ends_with(suffix) {
            return replace_suffix(word, suffix.len(), plural);
        }
    }
    if lower.ends_with(['s', 'x', 'z']) || lower.ends_with("ch") || lower.ends_with("sh") {
        return format!("{word}es");
    }
    if let Some(stem) = lower.strip_suffix('y') {
        if stem.ends_with(|c: char| !"aeiou".contains(c)) || stem.ends_with("qu") {
            return replace_suffix(word, 1, "ies");
        }
    }
    if lower.ends_with("fe") && !lower.ends_with("ffe") {
        return replace_suffix(word, 2, "ves");
    }
    if lower.ends_with("lf") || lower.ends_with("rf") {
        return replace_suffix(word, 1, "ves");
    }
    format!("{word}s")
}

fn replace_suffix(word: &str, len: usize, replacement: &str) -> String {
    format!("{}{replacement}", &word[..word.len() - len])
}

fn keep_case(original: &str, replacement: &str) -> String {
    if original.starts_with(|c: char| c.is_uppercase()) {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        replacement.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singularize() {
        let cases = [
            ("users", "user"),
            ("posts", "post"),
            ("categories", "category"),
            ("addresses", "address"),
            ("boxes", "box"),
            ("matches", "match"),
            ("wishes", "wish"),
            ("people", "person"),
            ("children", "child"),
            ("statuses", "status"),
            ("status", "status"),
            ("wolves", "wolf"),
            ("knives", "knife"),
            ("series", "series"),
            ("news", "news"),
            ("heroes", "hero"),
            ("movies", "movie"),
            ("quizzes", "quiz"),
            ("data", "datum"),
            ("line_items", "line_item"),
            ("admin_people", "admin_person"),
            ("user", "user"),
            ("days", "day"),
            ("databases", "database"),
            ("media", "medium"),
        ];
        for (plural, singular) in cases {
            assert_eq!(singularize(plural), singular, "{plural}");
        }
    }

    #[test]
    fn test_pluralize() {
        let cases = [
            ("user", "users"),
            ("category", "categories"),
            ("day", "days"),
            ("address", "addresses"),
            ("box", "boxes"),
            ("person", "people"),
            ("knife", "knives"),
            ("wolf", "wolves"),
            ("line_item", "line_items"),
            ("author", "authors"),
            ("sheep", "sheep"),
        ];
        for (singular, plural) in cases {
            assert_eq!(pluralize(singular), plural, "{singular}");
        }
    }
}
