//! Cloud Files response parsers
//!
//! Listings are JSON arrays and are wrapped under `containers` or
//! `objects`. Metadata parsers read response headers.

use nb_core::{Attributes, Error, FieldType, RawResponse, Result, Value};

fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::String(n.to_string()),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            let mut attrs = Attributes::new();
            for (key, value) in map {
                attrs.insert(key, from_json(value));
            }
            Value::Map(attrs)
        }
    }
}

fn listing(raw: &RawResponse, key: &str) -> Result<Attributes> {
    if raw.status == 204 || raw.body.is_empty() {
        return Ok(Attributes::new().with(key, Vec::<Value>::new()));
    }
    let json: serde_json::Value = serde_json::from_slice(&raw.body)?;
    let items = match from_json(json) {
        Value::List(items) => items,
        other => {
            return Err(Error::Parse(format!(
                "Expected a JSON array listing, got {other}"
            )));
        }
    };
    Ok(Attributes::new().with(key, items))
}

fn integer_header(raw: &RawResponse, name: &str) -> Value {
    raw.header(name)
        .map(|v| Value::from(v).coerce(FieldType::Integer))
        .unwrap_or(Value::Null)
}

/// `[{name, count, bytes}]` under `containers`
pub fn get_containers(raw: &RawResponse) -> Result<Attributes> {
    listing(raw, "containers")
}

/// `[{name, hash, bytes, content_type, last_modified}]` under `objects`
pub fn get_container(raw: &RawResponse) -> Result<Attributes> {
    let mut body = listing(raw, "objects")?;
    if let Some(Value::List(objects)) = body.get_mut("objects") {
        for object in objects.iter_mut() {
            if let Value::Map(object) = object {
                if let Some(modified) = object.remove("last_modified") {
                    object.insert("last_modified", modified.coerce(FieldType::Timestamp));
                }
            }
        }
    }
    Ok(body)
}

pub fn account_metadata(raw: &RawResponse) -> Result<Attributes> {
    Ok(Attributes::new()
        .with(
            "X-Account-Container-Count",
            integer_header(raw, "x-account-container-count"),
        )
        .with(
            "X-Account-Bytes-Used",
            integer_header(raw, "x-account-bytes-used"),
        ))
}

pub fn container_metadata(raw: &RawResponse) -> Result<Attributes> {
    Ok(Attributes::new()
        .with(
            "X-Container-Object-Count",
            integer_header(raw, "x-container-object-count"),
        )
        .with(
            "X-Container-Bytes-Used",
            integer_header(raw, "x-container-bytes-used"),
        ))
}

pub fn put_object(raw: &RawResponse) -> Result<Attributes> {
    Ok(Attributes::new().with("hash", raw.header("etag").unwrap_or_default()))
}

/// Object metadata from `HEAD`/`GET` response headers, in listing field names
pub fn object_metadata(raw: &RawResponse) -> Result<Attributes> {
    let mut attrs = Attributes::new();
    if let Some(etag) = raw.header("etag") {
        attrs.insert("hash", etag);
    }
    attrs.insert("bytes", integer_header(raw, "content-length"));
    if let Some(content_type) = raw.header("content-type") {
        attrs.insert("content_type", content_type);
    }
    if let Some(modified) = raw.header("last-modified") {
        attrs.insert(
            "last_modified",
            Value::from(modified).coerce(FieldType::Timestamp),
        );
    }
    Ok(attrs)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            body: body.to_string().into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_get_containers() {
        let body = get_containers(&raw(200, GET_CONTAINERS)).unwrap();
        let containers = body.get_list("containers").unwrap();
        assert_eq!(containers.len(), 2);
        let first = containers[0].as_map().unwrap();
        assert_eq!(first.get_str("name"), Some("test_container_1"));
        assert_eq!(first.get_i64("count"), Some(2));
        assert_eq!(first.get_i64("bytes"), Some(78));
    }

    #[test]
    fn test_empty_account_is_empty_list() {
        let body = get_containers(&raw(204, "")).unwrap();
        assert!(body.get_list("containers").unwrap().is_empty());
    }

    #[test]
    fn test_get_container_parses_times() {
        let body = get_container(&raw(200, GET_CONTAINER)).unwrap();
        let objects = body.get_list("objects").unwrap();
        let first = objects[0].as_map().unwrap();
        assert_eq!(first.get_str("hash"), Some("4281c348eaf83e70ddce0e07221c3d28"));
        assert!(matches!(first.get("last_modified"), Some(Value::Timestamp(_))));
        let mut keys = first.keys().collect::<Vec<_>>();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["bytes", "content_type", "hash", "last_modified", "name"]
        );
    }

    #[test]
    fn test_listing_must_be_array() {
        assert!(matches!(
            get_containers(&raw(200, r#"{"name": "x"}"#)),
            Err(Error::Parse(_))
        ));
        assert!(matches!(get_containers(&raw(200, "not json")), Err(Error::Parse(_))));
    }

    #[test]
    fn test_metadata_headers() {
        let mut response = raw(204, "");
        for (key, value) in [
            ("x-container-object-count", "3"),
            ("x-container-bytes-used", "1024"),
            ("etag", "abc"),
            ("content-length", "12"),
            ("content-type", "text/plain"),
            ("last-modified", "Tue, 03 Feb 2009 05:26:32 GMT"),
        ] {
            response.headers.insert(key.to_string(), value.to_string());
        }

        let container = container_metadata(&response).unwrap();
        assert_eq!(container.get_i64("X-Container-Object-Count"), Some(3));
        assert_eq!(container.get_i64("X-Container-Bytes-Used"), Some(1024));

        let object = object_metadata(&response).unwrap();
        assert_eq!(object.get_str("hash"), Some("abc"));
        assert_eq!(object.get_i64("bytes"), Some(12));
        assert!(matches!(object.get("last_modified"), Some(Value::Timestamp(_))));

        let account = account_metadata(&raw(204, "")).unwrap();
        assert!(account.get("X-Account-Bytes-Used").unwrap().is_null());
    }
}
