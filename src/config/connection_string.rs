use super::{Authentication, Configuration, ConnectionOptions, PoolOptions, ProtocolOptions};
use crate::error::TdsMiddlewareError;

/// Parse an ADO.NET-style connection string such as
/// `Server=tcp:db.local,1433;Database=shop;User Id=app;Password='p;w'`.
///
/// Keys are case-insensitive; values may be quoted with `'` or `"`, a doubled
/// quote inside a quoted value stands for one quote. Unknown keys are ignored.
///
/// # Errors
/// Returns `TdsMiddlewareError::ConfigError` for a segment without `=`, an
/// unterminated quote, or a value that does not parse.
pub fn parse_connection_string(input: &str) -> Result<Configuration, TdsMiddlewareError> {
    let mut connection = ConnectionOptions::default();
    let mut options = ProtocolOptions::default();
    let mut pool = PoolOptions::default();
    let mut user = String::new();
    let mut password = String::new();
    let mut integrated = false;

    for (key, value) in split_pairs(input)? {
        match key.as_str() {
            "server" | "data source" | "address" | "addr" | "network address" => {
                apply_server(&mut connection, &value)?;
            }
            "database" | "initial catalog" => connection.database = Some(value),
            "user id" | "uid" | "user" => user = value,
            "password" | "pwd" => password = value,
            "integrated security" | "trusted_connection" => {
                integrated = value.eq_ignore_ascii_case("sspi") || parse_bool(&key, &value)?;
            }
            "encrypt" => options.encrypt = parse_bool(&key, &value)?,
            "trustservercertificate" | "trust server certificate" => {
                options.trust_server_certificate = parse_bool(&key, &value)?;
            }
            "application name" | "app" => options.application_name = Some(value),
            "connect timeout" | "connection timeout" | "timeout" => {
                let secs: u64 = parse_number(&key, &value)?;
                options.connect_timeout = Some(secs.saturating_mul(1000));
            }
            "min pool size" => pool.min = parse_number(&key, &value)?,
            "max pool size" => pool.max = parse_number(&key, &value)?,
            _ => {}
        }
    }

    connection.authentication = if integrated {
        Authentication::Integrated
    } else {
        Authentication::SqlServer { user, password }
    };
    connection.options = options;

    Ok(Configuration { connection, pool })
}

fn apply_server(
    connection: &mut ConnectionOptions,
    value: &str,
) -> Result<(), TdsMiddlewareError> {
    let value = value.trim();
    let value = value
        .strip_prefix("tcp:")
        .or_else(|| value.strip_prefix("TCP:"))
        .unwrap_or(value);

    let (host_part, port) = match value.rsplit_once(',') {
        Some((host, port)) => (host.trim(), Some(parse_number::<u16>("server", port.trim())?)),
        None => (value, None),
    };
    let (host, instance) = match host_part.split_once('\\') {
        Some((host, instance)) if !instance.is_empty() => (host, Some(instance.to_string())),
        Some((host, _)) => (host, None),
        None => (host_part, None),
    };

    connection.server = match host {
        "." | "(local)" => "localhost".to_string(),
        other => other.to_string(),
    };
    connection.port = port;
    connection.instance_name = instance;
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, TdsMiddlewareError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "mandatory" | "strict" => Ok(true),
        "false" | "no" | "0" | "optional" => Ok(false),
        other => Err(TdsMiddlewareError::ConfigError(format!(
            "invalid boolean for {key}: {other}"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, TdsMiddlewareError> {
    value
        .trim()
        .parse()
        .map_err(|_| TdsMiddlewareError::ConfigError(format!("invalid number for {key}: {value}")))
}

/// Split into lower-cased keys and unquoted values.
fn split_pairs(input: &str) -> Result<Vec<(String, String)>, TdsMiddlewareError> {
    let mut pairs = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        // key
        let mut key = String::new();
        let mut saw_equals = false;
        for c in chars.by_ref() {
            match c {
                '=' => {
                    saw_equals = true;
                    break;
                }
                ';' => break,
                _ => key.push(c),
            }
        }
        let key = key.trim().to_ascii_lowercase();
        if !saw_equals {
            if key.is_empty() {
                if chars.peek().is_none() {
                    break;
                }
                continue;
            }
            return Err(TdsMiddlewareError::ConfigError(format!(
                "missing '=' after key {key}"
            )));
        }

        // value
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let mut value = String::new();
        match chars.peek().copied() {
            Some(quote @ ('\'' | '"')) => {
                chars.next();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == quote {
                        if chars.peek() == Some(&quote) {
                            chars.next();
                            value.push(quote);
                        } else {
                            closed = true;
                            break;
                        }
                    } else {
                        value.push(c);
                    }
                }
                if !closed {
                    return Err(TdsMiddlewareError::ConfigError(format!(
                        "unterminated quoted value for {key}"
                    )));
                }
                // skip to the next separator
                for c in chars.by_ref() {
                    if c == ';' {
                        break;
                    }
                }
            }
            _ => {
                for c in chars.by_ref() {
                    if c == ';' {
                        break;
                    }
                    value.push(c);
                }
                value = value.trim().to_string();
            }
        }

        if key.is_empty() {
            return Err(TdsMiddlewareError::ConfigError(
                "empty key in connection string".to_string(),
            ));
        }
        pairs.push((key, value));

        if chars.peek().is_none() {
            break;
        }
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typical_string() {
        let config = parse_connection_string(
            "Server=tcp:db.local,1444;Initial Catalog=shop;User Id=app;Password=secret;Encrypt=yes;TrustServerCertificate=true;Application Name=billing",
        )
        .expect("parses");

        let conn = &config.connection;
        assert_eq!(conn.server, "db.local");
        assert_eq!(conn.port, Some(1444));
        assert_eq!(conn.database.as_deref(), Some("shop"));
        assert_eq!(
            conn.authentication,
            Authentication::SqlServer {
                user: "app".into(),
                password: "secret".into()
            }
        );
        assert!(conn.options.encrypt);
        assert!(conn.options.trust_server_certificate);
        assert_eq!(conn.options.application_name.as_deref(), Some("billing"));
        assert_eq!(config.pool, PoolOptions::default());
    }

    #[test]
    fn quoted_values_keep_separators() {
        let config =
            parse_connection_string("server=h;password='p;w''d';user id=\"u\"").expect("parses");
        assert_eq!(
            config.connection.authentication,
            Authentication::SqlServer {
                user: "u".into(),
                password: "p;w'd".into()
            }
        );
    }

    #[test]
    fn instance_names_and_pool_sizes() {
        let config = parse_connection_string(
            "Data Source=.\\SQLEXPRESS;Integrated Security=SSPI;Min Pool Size=2;Max Pool Size=5;Connect Timeout=3;",
        )
        .expect("parses");
        assert_eq!(config.connection.server, "localhost");
        assert_eq!(config.connection.instance_name.as_deref(), Some("SQLEXPRESS"));
        assert_eq!(config.connection.authentication, Authentication::Integrated);
        assert_eq!(config.pool.min, 2);
        assert_eq!(config.pool.max, 5);
        assert_eq!(config.connection.options.connect_timeout, Some(3000));
    }

    #[test]
    fn malformed_strings_are_rejected() {
        assert!(parse_connection_string("Server").is_err());
        assert!(parse_connection_string("Server=h;Password='open").is_err());
        assert!(parse_connection_string("Server=h,notaport").is_err());
        assert!(parse_connection_string("Server=h;Encrypt=maybe").is_err());
    }

    #[test]
    fn unknown_keys_and_empty_segments_are_ignored() {
        let config = parse_connection_string(";;Server=h;;Packet Size=4096;").expect("parses");
        assert_eq!(config.connection.server, "h");
    }
}
