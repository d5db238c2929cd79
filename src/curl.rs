//! Render a [Request] as an equivalent `curl` invocation, handy for logs

use reqwest::{Method, Request, header::COOKIE};

const SEPARATOR: &str = " \\\n\t";

/// `curl` command line for `request`.
///
/// Cookies are left out. The body is only included when it is in memory and valid utf-8.
pub fn curl_command(request: &Request) -> String {
    let mut base = format!("curl {}", request.url());
    if *request.method() == Method::HEAD {
        base.push_str(" --head");
    }

    let mut parts = vec![base];
    if *request.method() != Method::GET && *request.method() != Method::HEAD {
        parts.push(format!("-X {}", request.method()));
    }

    for (name, value) in request.headers() {
        if *name == COOKIE {
            continue;
        }
        parts.push(format!(
            "-H '{}: {}'",
            name,
            String::from_utf8_lossy(value.as_bytes())
        ));
    }

    if let Some(body) = request
        .body()
        .and_then(|body| body.as_bytes())
        .and_then(|bytes| str::from_utf8(bytes).ok())
    {
        parts.push(format!("-d '{body}'"));
    }

    parts.join(SEPARATOR)
}
