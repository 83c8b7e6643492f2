//! HTTP Method enum used for route registration

/// HTTP Method
///
/// `Any` is a registration-only value: it expands to every concrete
/// method and never appears on an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Method {
    Get = 0,
    Post = 1,
    Put = 2,
    Delete = 3,
    Patch = 4,
    Head = 5,
    Options = 6,
    Any = 7,
}

impl Method {
    /// Every concrete method, in the order `Any` registers them
    pub const ALL: [Method; 7] = [
        Method::Delete,
        Method::Get,
        Method::Head,
        Method::Options,
        Method::Patch,
        Method::Post,
        Method::Put,
    ];

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Any => "ANY",
        }
    }

    /// Concrete methods this value registers under
    pub fn expand(self) -> &'static [Method] {
        match self {
            Method::Any => &Self::ALL,
            Method::Get => &[Method::Get],
            Method::Post => &[Method::Post],
            Method::Put => &[Method::Put],
            Method::Delete => &[Method::Delete],
            Method::Patch => &[Method::Patch],
            Method::Head => &[Method::Head],
            Method::Options => &[Method::Options],
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_str_matches_http_method() {
        for method in Method::ALL {
            let parsed: http::Method = method.as_str().parse().unwrap();
            assert_eq!(parsed.as_str(), method.to_string());
        }
        assert_eq!(Method::Any.as_str(), "ANY");
    }

    #[test]
    fn test_any_expands_to_all_concrete() {
        let all = Method::Any.expand();
        assert_eq!(all.len(), 7);
        assert!(!all.contains(&Method::Any));
        assert_eq!(Method::Get.expand(), &[Method::Get]);
    }
}
