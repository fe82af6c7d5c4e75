//! Small integer codes stored in place of method and framework names

/// HTTP method code, `None` for methods the store does not record
pub fn method_code(method: &str) -> Option<i16> {
    let code = match method.to_ascii_uppercase().as_str() {
        "GET" => 0,
        "POST" => 1,
        "PUT" => 2,
        "PATCH" => 3,
        "DELETE" => 4,
        "OPTIONS" => 5,
        "CONNECT" => 6,
        "HEAD" => 7,
        "TRACE" => 8,
        _ => return None,
    };
    Some(code)
}

const FRAMEWORKS: [&str; 18] = [
    "FastAPI",
    "Flask",
    "Gin",
    "Echo",
    "Express",
    "Fastify",
    "Koa",
    "Chi",
    "Fiber",
    "Actix",
    "Axum",
    "Tornado",
    "Django",
    "Rails",
    "Laravel",
    "Sinatra",
    "Rocket",
    "ASP.NET Core",
];

/// Framework code by case-insensitive name
pub fn framework_code(name: &str) -> Option<i16> {
    FRAMEWORKS
        .iter()
        .position(|known| known.eq_ignore_ascii_case(name))
        .map(|idx| idx as i16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_codes() {
        assert_eq!(method_code("GET"), Some(0));
        assert_eq!(method_code("post"), Some(1));
        assert_eq!(method_code("DELETE"), Some(4));
        assert_eq!(method_code("TRACE"), Some(8));
        assert_eq!(method_code("PROPFIND"), None);
        assert_eq!(method_code(""), None);
    }

    #[test]
    fn test_framework_codes() {
        assert_eq!(framework_code("FastAPI"), Some(0));
        assert_eq!(framework_code("gin"), Some(2));
        assert_eq!(framework_code("Axum"), Some(10));
        assert_eq!(framework_code("Rails"), Some(13));
        assert_eq!(framework_code("Cobol on Cogs"), None);
    }
}
