use std::{collections::BTreeMap, path::Path};

use serde_json::Value;

use crate::{
    error::{Error, Result},
    item::{Item, STATUS_PUBLISHED},
};

/// A parsed content file: cached metadata plus the raw markdown body.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub item: Item,
    pub body: String,
}

/// Parse a content file: YAML front matter delimited by `---` lines,
/// markdown body after.
///
/// `relative_path` is the file's path relative to the site root and is
/// stored on the item for hydration. The item's `id` is left empty when the
/// front matter has none; the index builder assigns a placeholder.
pub fn parse_file(
    path: &Path,
    relative_path: &str,
    type_name: &str,
    taxonomies: &[String],
) -> Result<ParsedFile> {
    let raw = std::fs::read_to_string(path)?;
    parse_str(&raw, relative_path, type_name, taxonomies)
}

/// Parse already-loaded file content. See [`parse_file`].
pub fn parse_str(
    raw: &str,
    relative_path: &str,
    type_name: &str,
    taxonomies: &[String],
) -> Result<ParsedFile> {
    let (front, body) = split_front_matter(raw);

    let mut matter: BTreeMap<String, Value> = match front {
        Some(yaml) => {
            let parsed: serde_yaml::Value = serde_yaml::from_str(yaml)
                .map_err(|e| Error::parse(relative_path, e.to_string()))?;
            match serde_json::to_value(parsed) {
                Ok(Value::Object(map)) => map.into_iter().collect(),
                Ok(Value::Null) => BTreeMap::new(),
                Ok(_) => {
                    return Err(Error::parse(
                        relative_path,
                        "front matter must be a mapping",
                    ));
                }
                Err(e) => {
                    return Err(Error::parse(relative_path, e.to_string()));
                }
            }
        }
        None => BTreeMap::new(),
    };

    let stem = file_stem(relative_path);
    let (date_from_name, stem) = strip_date_prefix(&stem);

    let id = take_string(&mut matter, "id").unwrap_or_default();
    let slug = take_string(&mut matter, "slug")
        .map(|s| slugify(&s))
        .unwrap_or_else(|| slugify(stem));
    let title = take_string(&mut matter, "title")
        .or_else(|| heading_title(body))
        .unwrap_or_else(|| stem.to_string());
    let status = take_string(&mut matter, "status")
        .unwrap_or_else(|| STATUS_PUBLISHED.to_string());
    let date = take_string(&mut matter, "date")
        .as_deref()
        .and_then(parse_date)
        .or(date_from_name);
    let updated = take_string(&mut matter, "updated")
        .as_deref()
        .and_then(parse_date);
    let excerpt = take_string(&mut matter, "excerpt");
    let order = match matter.remove("order") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };

    let mut terms = BTreeMap::new();
    for taxonomy in taxonomies {
        if let Some(value) = matter.remove(taxonomy) {
            let slugs = term_slugs(&value);
            if !slugs.is_empty() {
                terms.insert(taxonomy.clone(), slugs);
            }
        }
    }

    let item = Item {
        id,
        type_name: type_name.to_string(),
        slug,
        title,
        status,
        date,
        updated,
        excerpt,
        order,
        fields: matter,
        terms,
        file_path: relative_path.to_string(),
    };

    Ok(ParsedFile {
        item,
        body: body.trim_start_matches(['\r', '\n']).to_string(),
    })
}

/// Split `raw` into (front matter, body). Front matter requires an opening
/// `---` on the first line and a closing `---` line.
fn split_front_matter(raw: &str) -> (Option<&str>, &str) {
    let rest = match raw.strip_prefix("---") {
        Some(rest) if rest.starts_with('\n') || rest.starts_with("\r\n") => {
            rest
        }
        _ => return (None, raw),
    };
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" && offset > 0 {
            let front = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(front), body);
        }
        offset += line.len();
    }
    // Unterminated front matter: treat the whole file as body.
    (None, raw)
}

fn file_stem(relative_path: &str) -> String {
    Path::new(relative_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}

/// Strip a `YYYY-MM-DD-` filename prefix, returning it as a date fallback.
fn strip_date_prefix(stem: &str) -> (Option<chrono::NaiveDate>, &str) {
    let bytes = stem.as_bytes();
    if bytes.len() > 11
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes[10] == b'-'
        && bytes[..10]
            .iter()
            .enumerate()
            .all(|(i, b)| matches!(i, 4 | 7) || b.is_ascii_digit())
    {
        if let Some(date) = parse_date(&stem[..10]) {
            return (Some(date), &stem[11..]);
        }
    }
    (None, stem)
}

fn parse_date(s: &str) -> Option<chrono::NaiveDate> {
    let s = s.trim();
    let prefix = s.get(..10)?;
    chrono::NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

fn take_string(matter: &mut BTreeMap<String, Value>, key: &str) -> Option<String> {
    match matter.remove(key)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        other => {
            // Put non-scalar values back so they survive as custom fields.
            matter.insert(key.to_string(), other);
            None
        }
    }
}

fn term_slugs(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.trim().to_string()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// First markdown heading (`# `) in the body, if any.
fn heading_title(body: &str) -> Option<String> {
    for line in body.lines() {
        if let Some(heading) = line.trim().strip_prefix("# ") {
            let title = heading.trim();
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
    }
    None
}

/// Turn arbitrary text into a URL-safe slug: lowercase alphanumeric runs
/// joined by single hyphens.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_sep = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxonomies() -> Vec<String> {
        vec!["category".to_string(), "tag".to_string()]
    }

    #[test]
    fn parses_full_front_matter() {
        let raw = "---\n\
            id: 01ARZ3NDEKTSV4RRFFQ69G5FAV\n\
            title: Hello World\n\
            status: draft\n\
            date: 2024-01-15\n\
            excerpt: A greeting.\n\
            order: 3\n\
            featured: true\n\
            tag:\n  - rust\n  - cli\n\
            ---\n\nBody text here.\n";

        let parsed = parse_str(raw, "content/posts/hello.md", "post", &taxonomies()).unwrap();
        let item = &parsed.item;

        assert_eq!(item.id, "01ARZ3NDEKTSV4RRFFQ69G5FAV");
        assert_eq!(item.title, "Hello World");
        assert_eq!(item.slug, "hello");
        assert_eq!(item.status, "draft");
        assert_eq!(
            item.date,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(item.excerpt.as_deref(), Some("A greeting."));
        assert_eq!(item.order, 3);
        assert!(item.is_featured());
        assert_eq!(item.terms_for("tag"), ["rust", "cli"]);
        assert_eq!(parsed.body, "Body text here.\n");
    }

    #[test]
    fn no_front_matter_uses_fallbacks() {
        let raw = "# A Heading\n\nJust body.\n";
        let parsed =
            parse_str(raw, "content/pages/about.md", "page", &[]).unwrap();

        assert!(parsed.item.id.is_empty());
        assert_eq!(parsed.item.title, "A Heading");
        assert_eq!(parsed.item.slug, "about");
        assert_eq!(parsed.item.status, STATUS_PUBLISHED);
        assert_eq!(parsed.body, raw);
    }

    #[test]
    fn date_prefix_in_filename() {
        let parsed = parse_str(
            "body only",
            "content/posts/2024-03-01-launch-day.md",
            "post",
            &[],
        )
        .unwrap();
        assert_eq!(parsed.item.slug, "launch-day");
        assert_eq!(
            parsed.item.date,
            chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[test]
    fn front_matter_date_beats_filename_date() {
        let raw = "---\ndate: 2023-06-30\n---\nbody";
        let parsed = parse_str(
            raw,
            "content/posts/2024-03-01-launch.md",
            "post",
            &[],
        )
        .unwrap();
        assert_eq!(
            parsed.item.date,
            chrono::NaiveDate::from_ymd_opt(2023, 6, 30)
        );
    }

    #[test]
    fn unknown_keys_land_in_fields() {
        let raw = "---\ntitle: T\nauthor: addy\nviews: 42\n---\n";
        let parsed =
            parse_str(raw, "content/posts/t.md", "post", &[]).unwrap();
        assert_eq!(
            parsed.item.field("author"),
            Some(&Value::String("addy".to_string()))
        );
        assert_eq!(parsed.item.field("views"), Some(&Value::from(42)));
    }

    #[test]
    fn single_term_as_scalar() {
        let raw = "---\ncategory: tutorials\n---\n";
        let parsed =
            parse_str(raw, "content/posts/t.md", "post", &taxonomies())
                .unwrap();
        assert_eq!(parsed.item.terms_for("category"), ["tutorials"]);
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let raw = "---\ntitle: [unclosed\n---\n";
        let err = parse_str(raw, "content/posts/bad.md", "post", &[])
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn unterminated_front_matter_is_body() {
        let raw = "---\ntitle: T\nno closing fence";
        let parsed =
            parse_str(raw, "content/pages/x.md", "page", &[]).unwrap();
        assert_eq!(parsed.item.title, "x");
        assert_eq!(parsed.body, raw);
    }

    #[test]
    fn slugify_basics() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Rust & CLI!  "), "rust-cli");
        assert_eq!(slugify("Déjà Vu"), "déjà-vu");
        assert_eq!(slugify("a--b"), "a-b");
    }
}
