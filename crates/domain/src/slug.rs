//! Slugs — topic-safe identifiers derived from display names.

/// Fold the accented letters used in Czech and German names.
fn fold(c: char) -> Option<char> {
    let folded = match c {
        'á' | 'ä' | 'à' | 'â' => 'a',
        'č' | 'ç' => 'c',
        'ď' => 'd',
        'é' | 'ě' | 'ë' | 'è' | 'ê' => 'e',
        'í' | 'ï' | 'î' => 'i',
        'ň' => 'n',
        'ó' | 'ö' | 'ô' => 'o',
        'ř' => 'r',
        'š' | 'ß' => 's',
        'ť' => 't',
        'ú' | 'ů' | 'ü' | 'û' => 'u',
        'ý' | 'ÿ' => 'y',
        'ž' => 'z',
        _ => return None,
    };
    Some(folded)
}

/// Lowercase `[a-z0-9_]` slug; runs of other characters become a single
/// `_`, leading and trailing separators are dropped.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_alphanumeric() {
            Some(c)
        } else {
            fold(c)
        };
        match c {
            Some(c) => {
                if pending_sep && !slug.is_empty() {
                    slug.push('_');
                }
                pending_sep = false;
                slug.push(c);
            }
            None => pending_sep = true,
        }
    }
    slug
}
