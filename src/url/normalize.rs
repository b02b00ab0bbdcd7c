use percent_encoding::percent_decode_str;

/// Upper bound on decoding passes for nested percent-encoding
const MAX_DECODE_PASSES: usize = 16;

/// A URL split into the parts the rewrite engine edits independently
///
/// The base is everything before `?`; query and fragment are kept as raw
/// `&`-separated segments so untouched parameters keep their exact encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    base: String,
    query: Option<Vec<String>>,
    fragment: Option<Vec<String>>,
}

impl UrlParts {
    /// Splits a URL string
    ///
    /// # Examples
    ///
    /// ```
    /// use linkscrub::url::UrlParts;
    ///
    /// let parts = UrlParts::parse("https://a.com/p?x=1&y=2#z=3");
    /// assert_eq!(parts.base(), "https://a.com/p");
    /// assert_eq!(parts.assemble(), "https://a.com/p?x=1&y=2#z=3");
    /// ```
    pub fn parse(url: &str) -> Self {
        let (before_fragment, fragment) = match url.split_once('#') {
            Some((head, frag)) => (head, Some(split_segments(frag))),
            None => (url, None),
        };
        let (base, query) = match before_fragment.split_once('?') {
            Some((base, query)) => (base, Some(split_segments(query))),
            None => (before_fragment, None),
        };

        Self {
            base: base.to_string(),
            query,
            fragment,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Parameter names in the query, in order
    pub fn query_keys(&self) -> Vec<&str> {
        keys(self.query.as_deref())
    }

    /// Parameter names in the fragment, in order
    pub fn fragment_keys(&self) -> Vec<&str> {
        keys(self.fragment.as_deref())
    }

    /// Removes every query and fragment parameter whose name satisfies
    /// `remove`, returning the removed segments
    pub fn remove_params<F>(&mut self, mut remove: F) -> Vec<String>
    where
        F: FnMut(&str) -> bool,
    {
        let mut removed = Vec::new();
        for segments in [&mut self.query, &mut self.fragment].into_iter().flatten() {
            segments.retain(|segment| {
                if !segment.is_empty() && remove(param_key(segment)) {
                    removed.push(segment.clone());
                    false
                } else {
                    true
                }
            });
        }
        removed
    }

    /// Reassembles the URL, dropping a query or fragment left empty
    pub fn assemble(&self) -> String {
        let mut url = self.base.clone();
        if let Some(query) = joined(self.query.as_deref()) {
            url.push('?');
            url.push_str(&query);
        }
        if let Some(fragment) = joined(self.fragment.as_deref()) {
            url.push('#');
            url.push_str(&fragment);
        }
        url
    }
}

fn split_segments(raw: &str) -> Vec<String> {
    raw.split('&').map(str::to_string).collect()
}

fn keys(segments: Option<&[String]>) -> Vec<&str> {
    segments
        .unwrap_or_default()
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| param_key(s))
        .collect()
}

fn joined(segments: Option<&[String]>) -> Option<String> {
    let parts: Vec<&str> = segments?
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("&"))
    }
}

/// The name part of a `name=value` segment
pub fn param_key(segment: &str) -> &str {
    segment.split_once('=').map_or(segment, |(key, _)| key)
}

/// Percent-decodes repeatedly until the value stops changing
///
/// # Examples
///
/// ```
/// use linkscrub::url::decode_until_stable;
///
/// assert_eq!(decode_until_stable("https%253A%252F%252Fa.com"), "https://a.com");
/// ```
pub fn decode_until_stable(value: &str) -> String {
    let mut current = value.to_string();
    for _ in 0..MAX_DECODE_PASSES {
        let decoded = percent_decode_str(&current).decode_utf8_lossy().into_owned();
        if decoded == current {
            break;
        }
        current = decoded;
    }
    current
}

/// Prefixes `https://` onto a redirect target that has no scheme
///
/// # Examples
///
/// ```
/// use linkscrub::url::ensure_scheme;
///
/// assert_eq!(ensure_scheme("example.com/a"), "https://example.com/a");
/// assert_eq!(ensure_scheme("//example.com/a"), "https://example.com/a");
/// assert_eq!(ensure_scheme("http://example.com/"), "http://example.com/");
/// ```
pub fn ensure_scheme(target: &str) -> String {
    if has_scheme(target) {
        target.to_string()
    } else if let Some(rest) = target.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        format!("https://{}", target)
    }
}

fn has_scheme(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
}
