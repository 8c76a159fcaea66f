fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;

    use sqlbridge_protocol::{
        CallArgument, IsolationLevel, Operation, QueryResult, ServerFault, UpdateResult,
        isolation_to_wire_token,
    };
    use sqlbridge_transport::{Credentials, RemoteResponse, TransportConfig};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Normalizes JSON numbers so that `17` and `17.0` compare equal.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
        parsed
    }

    // --- Call payloads ---

    #[test]
    fn fixture_call_argument() {
        let arg: CallArgument = roundtrip_test("call_argument.json");
        assert!(arg.value.starts_with("SELECT"));
    }

    #[test]
    fn fixture_operations_are_path_segments() {
        let names: Vec<Operation> = roundtrip_test("operations.json");
        assert_eq!(names.len(), 6);
        for op in names {
            let json = serde_json::to_value(op).unwrap();
            assert_eq!(json, serde_json::json!(op.as_str()));
        }
    }

    // --- Responses ---

    #[test]
    fn fixture_server_fault_detailed() {
        let fault: ServerFault = roundtrip_test("server_fault_detailed.json");
        assert_eq!(fault.code(), Some(942));
        assert_eq!(fault.sql_state(), Some("42000"));

        let body = fs::read(fixtures_dir().join("server_fault_detailed.json")).unwrap();
        let err = RemoteResponse::new(200, body).classify().unwrap_err();
        assert_eq!(err.remote_fault().unwrap().code, Some(942));
    }

    #[test]
    fn fixture_server_fault_message() {
        let fault: ServerFault = roundtrip_test("server_fault_message.json");
        assert_eq!(fault.message(), "session expired");
        assert_eq!(fault.code(), None);
    }

    #[test]
    fn fixture_query_result() {
        let result: QueryResult = roundtrip_test("query_result.json");
        assert_eq!(result.len(), 2);
        assert_eq!(result.column_index("closed"), Some(3));
        assert!(result.rows[1][2].is_null());
    }

    #[test]
    fn fixture_update_result() {
        let result: UpdateResult = roundtrip_test("update_result.json");
        assert_eq!(result.update_count, 17);

        let body = fs::read(fixtures_dir().join("update_result.json")).unwrap();
        assert!(RemoteResponse::new(200, body).is_success());
    }

    // --- Isolation tokens ---

    #[test]
    fn fixture_isolation_tokens() {
        let table: BTreeMap<String, String> =
            serde_json::from_value(load_fixture("isolation_tokens.json")).unwrap();

        for (code, token) in &table {
            let code: i32 = code.parse().unwrap();
            assert_eq!(isolation_to_wire_token(code), token, "code {code}");
        }
        for level in IsolationLevel::ALL {
            let json = serde_json::to_value(level).unwrap();
            assert_eq!(json, serde_json::json!(level.wire_token()));
            assert_eq!(table[&level.code().to_string()], level.wire_token());
        }
    }

    // --- Configuration ---

    #[test]
    fn fixture_transport_config() {
        let config: TransportConfig = roundtrip_test("transport_config.json");
        assert_eq!(
            config.credentials,
            Credentials::Basic {
                username: "scott".into(),
                password: "tiger".into(),
            }
        );
        assert_eq!(config.proxy.as_ref().unwrap().password, None);
        assert!(config.validate().is_ok());
    }
}
