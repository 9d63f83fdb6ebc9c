use spicedash::error::SpicedashError;
use spicedash::query::{
    CONCURRENT_LIMIT_MESSAGE, DataQuery, QueryDataRequest, QueryModel, ResponseError, Status,
    ref_id_for,
};

// --- Query model ---

#[test]
fn test_parse_query_text() {
    let model = QueryModel::parse(r#"{"queryText": "SELECT 1", "refId": "A"}"#).unwrap();
    assert_eq!(model.sql().unwrap(), "SELECT 1");
}

#[test]
fn test_parse_capitalized_key() {
    let model = QueryModel::parse(r#"{"QueryText": "SELECT 2"}"#).unwrap();
    assert_eq!(model.sql().unwrap(), "SELECT 2");
}

#[test]
fn test_sql_is_trimmed() {
    let model = QueryModel::parse(r#"{"queryText": "  SELECT 3 \n"}"#).unwrap();
    assert_eq!(model.sql().unwrap(), "SELECT 3");
}

#[test]
fn test_empty_payload_is_bad_request() {
    let err = QueryModel::parse("").unwrap_err();
    assert!(matches!(err, SpicedashError::BadRequest { .. }));
    assert_eq!(err.detail(), "empty query");
}

#[test]
fn test_malformed_payload_is_bad_request() {
    let err = QueryModel::parse("{not json").unwrap_err();
    assert!(matches!(err, SpicedashError::BadRequest { .. }));
    assert!(err.detail().starts_with("json unmarshal:"), "Got: {}", err);
}

#[test]
fn test_blank_query_text_rejected() {
    for payload in [r#"{"queryText": "   "}"#, r#"{"refId": "A"}"#] {
        let model = QueryModel::parse(payload).unwrap();
        let err = model.sql().unwrap_err();
        assert!(matches!(err, SpicedashError::BadRequest { .. }), "payload {payload}");
    }
}

#[test]
fn test_data_query_sql_round_trips_through_model() {
    let query = DataQuery::sql("A", "SELECT \"quoted\" FROM t");
    let model = QueryModel::parse(&query.json).unwrap();
    assert_eq!(model.sql().unwrap(), "SELECT \"quoted\" FROM t");
}

// --- Requests ---

#[test]
fn test_ref_ids() {
    assert_eq!(ref_id_for(0), "A");
    assert_eq!(ref_id_for(1), "B");
    assert_eq!(ref_id_for(25), "Z");
    assert_eq!(ref_id_for(26), "AA");
    assert_eq!(ref_id_for(27), "AB");
    assert_eq!(ref_id_for(701), "ZZ");
    assert_eq!(ref_id_for(702), "AAA");
}

#[test]
fn test_request_from_sql() {
    let request = QueryDataRequest::from_sql(&["SELECT 1", "SELECT 2"]);
    let ids: Vec<&str> = request.queries.iter().map(|q| q.ref_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
}

#[test]
fn test_request_from_json() {
    let request = QueryDataRequest::from_json(
        r#"[{"refId": "blocks", "queryText": "SELECT 1"}, {"refId": "txs", "queryText": ""}]"#,
    )
    .unwrap();
    assert_eq!(request.queries.len(), 2);
    assert_eq!(request.queries[0].ref_id, "blocks");
    let model = QueryModel::parse(&request.queries[0].json).unwrap();
    assert_eq!(model.sql().unwrap(), "SELECT 1");
}

#[test]
fn test_request_from_json_requires_ref_id() {
    let err = QueryDataRequest::from_json(r#"[{"queryText": "SELECT 1"}]"#).unwrap_err();
    assert!(err.to_string().contains("query 1 has no refId"), "Got: {}", err);
}

#[test]
fn test_request_from_json_rejects_non_array() {
    let err = QueryDataRequest::from_json(r#"{"refId": "A"}"#).unwrap_err();
    assert!(err.to_string().contains("invalid request file"), "Got: {}", err);
}

// --- Error classification ---

#[test]
fn test_concurrent_limit_is_too_many_requests() {
    let err = SpicedashError::Query {
        message: CONCURRENT_LIMIT_MESSAGE.to_string(),
    };
    let response = ResponseError::from(&err);
    assert_eq!(response.status, Status::TooManyRequests);
    assert_eq!(response.message, CONCURRENT_LIMIT_MESSAGE);
}

#[test]
fn test_throttled_is_too_many_requests() {
    let err = SpicedashError::Throttled {
        message: "slow down".to_string(),
    };
    assert_eq!(ResponseError::from(&err).status, Status::TooManyRequests);
}

#[test]
fn test_timeout_classification() {
    let err = SpicedashError::Timeout {
        message: "context deadline exceeded".to_string(),
    };
    let response = ResponseError::from(&err);
    assert_eq!(response.status, Status::Timeout);
    assert_eq!(response.message, "context deadline exceeded");
}

#[test]
fn test_other_errors_are_internal_and_verbatim() {
    let err = SpicedashError::Query {
        message: "table 'eth.blocks' not found".to_string(),
    };
    let response = ResponseError::from(&err);
    assert_eq!(response.status, Status::Internal);
    assert_eq!(response.message, "table 'eth.blocks' not found");

    let err = SpicedashError::Connection {
        message: "connection refused".to_string(),
    };
    assert_eq!(ResponseError::from(&err).status, Status::Internal);
}

#[test]
fn test_limit_text_inside_longer_message_is_internal() {
    let err = SpicedashError::Query {
        message: format!("wrapped: {CONCURRENT_LIMIT_MESSAGE}"),
    };
    assert_eq!(ResponseError::from(&err).status, Status::Internal);
}

#[test]
fn test_status_codes() {
    assert_eq!(Status::BadRequest.code(), 400);
    assert_eq!(Status::Timeout.code(), 504);
    assert_eq!(Status::TooManyRequests.code(), 429);
    assert_eq!(Status::Internal.code(), 500);
    assert_eq!(Status::TooManyRequests.to_string(), "too_many_requests");
}
