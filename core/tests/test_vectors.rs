//! Verify request building and reply parsing against JSON test vectors stored
//! in `test-vectors/`.
//!
//! Each binding vector names an endpoint, its arguments, the expected request,
//! a simulated response and the expected result. Bodies are compared as
//! parsed JSON so field order does not matter.

use pnut_core::{
    ApiErrorKind, Args, Client, ClientConfig, Endpoint, HttpMethod, HttpResponse, ParamValue, PathArg, PnutError,
    Reply, RequestBody, Resource,
};
use serde_json::Value;

const API_ROOT: &str = "http://localhost:3000/v0";

fn client() -> Client {
    Client::new(ClientConfig::new(API_ROOT).with_access_token("test-token"))
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| {
            let pair = pair.as_array().unwrap();
            (pair[0].as_str().unwrap().to_string(), pair[1].as_str().unwrap().to_string())
        })
        .collect()
}

fn param(value: &Value) -> ParamValue {
    match value {
        Value::Bool(b) => ParamValue::Bool(*b),
        Value::Number(n) => ParamValue::Int(n.as_i64().unwrap()),
        Value::String(s) => ParamValue::Text(s.clone()),
        other => panic!("unsupported param value: {other}"),
    }
}

fn simulated(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    let body = match &sim["body"] {
        Value::Null => Vec::new(),
        Value::String(text) => text.clone().into_bytes(),
        other => other.to_string().into_bytes(),
    };
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: Vec::new(),
        body,
    }
}

fn resource_id(resource: &Resource) -> String {
    resource.serialize()["id"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

#[test]
fn binding_test_vectors() {
    let raw = include_str!("../../test-vectors/binding.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let endpoint = Endpoint::lookup(case["endpoint"].as_str().unwrap()).unwrap();
        let path_args: Vec<PathArg> = case["path_args"]
            .as_array()
            .unwrap()
            .iter()
            .map(|arg| arg.as_str().unwrap().into())
            .collect();
        let mut args = Args::new();
        for (key, value) in case["params"].as_object().unwrap() {
            args = args.param(key.as_str(), param(value));
        }
        if let Some(data) = case.get("data") {
            args = args.data(data.clone());
        }
        let expected_req = &case["expected_request"];

        // Verify build
        let req = c.build_request(endpoint, &path_args, args).unwrap();
        assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, format!("{API_ROOT}{}", expected_req["path"].as_str().unwrap()), "{name}: url");
        assert_eq!(req.query, pairs(&expected_req["query"]), "{name}: query");
        assert_eq!(req.headers, pairs(&expected_req["headers"]), "{name}: headers");
        match expected_req.get("body") {
            Some(expected_body) => {
                let RequestBody::Json(text) = &req.body else {
                    panic!("{name}: expected a JSON body, got {:?}", req.body);
                };
                let body: Value = serde_json::from_str(text).unwrap();
                assert_eq!(&body, expected_body, "{name}: body");
            }
            None => assert!(req.body.is_empty(), "{name}: body should be empty"),
        }

        // Verify parse
        let reply = c.parse_response(endpoint, simulated(case), false).unwrap();
        let expected = &case["expected_result"];
        let expected_ids: Vec<String> = expected
            .get("ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().map(|id| id.as_str().unwrap().to_string()).collect())
            .unwrap_or_default();
        match (expected["shape"].as_str().unwrap(), reply) {
            ("one", Reply::Data { data: pnut_core::Payload::One(resource), .. }) => {
                assert_eq!(vec![resource_id(&resource)], expected_ids, "{name}: ids");
                assert_eq!(resource.kind(), endpoint.payload, "{name}: payload kind");
            }
            ("many", Reply::Data { data: pnut_core::Payload::Many(resources), .. }) => {
                let ids: Vec<String> = resources.iter().map(resource_id).collect();
                assert_eq!(ids, expected_ids, "{name}: ids");
            }
            ("no_content", Reply::NoContent) => {}
            (shape, reply) => panic!("{name}: expected {shape}, got {reply:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

fn parse_kind(s: &str) -> ApiErrorKind {
    match s {
        "BadRequest" => ApiErrorKind::BadRequest,
        "Unauthorized" => ApiErrorKind::Unauthorized,
        "Forbidden" => ApiErrorKind::Forbidden,
        "NotFound" => ApiErrorKind::NotFound,
        "RateLimited" => ApiErrorKind::RateLimited,
        "Other" => ApiErrorKind::Other,
        other => panic!("unknown error kind: {other}"),
    }
}

#[test]
fn error_test_vectors() {
    let raw = include_str!("../../test-vectors/errors.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    let endpoint = Endpoint::lookup("get_post").unwrap();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let response = simulated(&serde_json::json!({"simulated_response": case}));
        let err = c.parse_response(endpoint, response, false).unwrap_err();

        match case["expected_error"].as_str().unwrap() {
            "Malformed" => assert!(matches!(err, PnutError::MalformedResponse(_)), "{name}: {err:?}"),
            kind => {
                let api = err.api_error().unwrap_or_else(|| panic!("{name}: not an api error: {err:?}"));
                assert_eq!(api.kind, parse_kind(kind), "{name}: kind");
                assert_eq!(Some(api.code), case["body"]["meta"]["code"].as_u64().map(|c| c as u16), "{name}: code");
                assert_eq!(api.message, case["expected_message"].as_str().unwrap(), "{name}: message");
                assert_eq!(api.envelope, case["body"], "{name}: envelope");
            }
        }
    }
}
