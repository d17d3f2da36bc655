use crate::proto::rpc_types::error::{Error, Result};

/// Reads the `package`, `service` and `rpc` declarations of a schema back into the sorted
/// list of full RPC paths it describes.
pub fn parse_rpc_paths(text: &str) -> Result<Vec<String>> {
    let mut package = String::new();
    let mut service: Option<String> = None;
    let mut depth = 0usize;
    let mut paths = Vec::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = match raw.find("//") {
            Some(idx) => &raw[..idx],
            None => raw,
        }
        .trim();
        if line.is_empty() {
            continue;
        }
        let err = |what: &str| Error::InvalidInput(format!("schema line {}: {}", lineno + 1, what));

        let mut words = line.split_whitespace();
        match words.next() {
            Some("package") if depth == 0 => {
                package = words
                    .next()
                    .map(|p| p.trim_end_matches(';').to_string())
                    .ok_or_else(|| err("package name missing"))?;
            }
            Some("service") if depth == 0 => {
                let name = words
                    .next()
                    .map(|n| n.trim_end_matches('{').to_string())
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| err("service name missing"))?;
                service = Some(name);
            }
            Some("rpc") => {
                let svc = match (&service, depth) {
                    (Some(svc), 1) => svc,
                    _ => return Err(err("rpc declared outside of a service")),
                };
                let name = words
                    .next()
                    .map(|n| n.split('(').next().unwrap_or(n))
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| err("rpc name missing"))?;
                let qualified = if package.is_empty() {
                    svc.clone()
                } else {
                    format!("{}.{}", package, svc)
                };
                paths.push(format!("/{}/{}", qualified, name));
            }
            _ => {}
        }

        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth = depth.checked_sub(1).ok_or_else(|| err("unbalanced '}'"))?;
                    if depth == 0 {
                        service = None;
                    }
                }
                _ => {}
            }
        }
    }

    if depth != 0 {
        return Err(Error::InvalidInput("schema ends inside a block".to_string()));
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_recovered() {
        let text = r#"syntax = "proto3";
package demo.v1;

message Req {
   int32 Id = 1; // rpc inside a comment is ignored
}
service Zeta {
   rpc B (Req) returns (Req);
}
service Alpha {
   rpc Watch (Req) returns (stream Req);
   rpc A(Req) returns (Req);
}
"#;
        assert_eq!(
            parse_rpc_paths(text).unwrap(),
            vec!["/demo.v1.Alpha/A", "/demo.v1.Alpha/Watch", "/demo.v1.Zeta/B"]
        );
    }

    #[rstest::rstest]
    #[case("rpc A (Req) returns (Req);\n")]
    #[case("service S {\n   rpc A (Req) returns (Req);\n")]
    #[case("}\n")]
    fn malformed_schema(#[case] text: &str) {
        assert!(matches!(parse_rpc_paths(text), Err(Error::InvalidInput(_))));
    }
}
