//! Page parameters for content listings

use crate::{ApiError, ApiResult};

/// Page number when the client sends none
pub const DEFAULT_PAGE: i64 = 1;

/// Rows per page when the client sends none
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Validated paging (both values 1 or greater)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: i64,
    pub page_size: i64,
}

/// Parse `page` and `pagesize` query values.
///
/// Missing values take the defaults. Non-numeric values, values below 1 and
/// pages whose row offset does not fit in an i64 are rejected.
pub fn parse_paging(page: Option<&str>, page_size: Option<&str>) -> ApiResult<Paging> {
    let paging = Paging {
        page: parse_positive("page", page, DEFAULT_PAGE)?,
        page_size: parse_positive("pagesize", page_size, DEFAULT_PAGE_SIZE)?,
    };

    if (paging.page - 1).checked_mul(paging.page_size).is_none() {
        return Err(ApiError::BadRequest(
            "Invalid page value: page is out of range".to_string(),
        ));
    }
    Ok(paging)
}

fn parse_positive(name: &str, value: Option<&str>, default: i64) -> ApiResult<i64> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };

    match raw.parse::<i64>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ApiError::BadRequest(format!(
            "Invalid {} value: must be an integer of at least 1",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let paging = parse_paging(None, None).unwrap();
        assert_eq!(paging, Paging { page: 1, page_size: 10 });

        let paging = parse_paging(Some(""), Some("  ")).unwrap();
        assert_eq!(paging, Paging { page: 1, page_size: 10 });
    }

    #[test]
    fn test_explicit_values() {
        let paging = parse_paging(Some("3"), Some("25")).unwrap();
        assert_eq!(paging, Paging { page: 3, page_size: 25 });
    }

    #[test]
    fn test_rejects_zero_negative_and_text() {
        assert!(matches!(parse_paging(Some("0"), None), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_paging(None, Some("-5")), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_paging(Some("two"), None), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_rejects_offset_overflow() {
        assert!(matches!(
            parse_paging(Some("9223372036854775807"), Some("10")),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            parse_paging(Some("2"), Some("9223372036854775807")),
            Err(ApiError::BadRequest(_))
        ));

        // A huge page with a page size of 1 still has a representable offset
        let paging = parse_paging(Some("9223372036854775807"), Some("1")).unwrap();
        assert_eq!(paging.page, i64::MAX);
    }
}
