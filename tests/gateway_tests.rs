use cashbook::cloud_adapters::MemorySheetsAdapter;
use cashbook::core::RecordStore;
use cashbook::gateway::{Envelope, Gateway, Params, RequestContext, RequestMethod, Status};
use serde_json::{Value, json};

const INCOME: &str = r#"{"Date":"2024-01-01","Source":"shop","Amount":100,"Currency":"EGP","Payment Method":"cash","User":"admin"}"#;

fn gateway() -> Gateway<MemorySheetsAdapter> {
    let mut store = RecordStore::new(MemorySheetsAdapter::new());
    store.setup().unwrap();
    store.add_user("01001234567", "secret").unwrap();
    Gateway::new(store)
}

fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn get(gw: &Gateway<MemorySheetsAdapter>, pairs: &[(&str, &str)]) -> Envelope {
    gw.dispatch(&RequestContext::new(RequestMethod::Get), &params(pairs))
}

#[test]
fn login_succeeds_with_normalized_phone() {
    let gw = gateway();
    let env = get(
        &gw,
        &[("action", "login"), ("phone", " ٠١٠٠١٢٣٤٥٦٧ "), ("password", "secret")],
    );
    assert_eq!(env, Envelope::ok(Some("Login successful"), None));
}

#[test]
fn login_rejects_wrong_password() {
    let gw = gateway();
    let env = get(
        &gw,
        &[("action", "login"), ("phone", "01001234567"), ("password", "nope")],
    );
    assert_eq!(env, Envelope::error("Invalid credentials"));
}

#[test]
fn login_requires_both_fields() {
    let gw = gateway();
    let env = get(&gw, &[("action", "login"), ("phone", "01001234567")]);
    assert_eq!(env, Envelope::error("Phone and password are required"));
}

#[test]
fn add_then_get_returns_record() {
    let gw = gateway();
    let env = get(&gw, &[("action", "add"), ("sheet", "Income"), ("data", INCOME)]);
    assert_eq!(env.status, Status::Ok);
    assert_eq!(
        env.data,
        Some(json!(["2024-01-01", "shop", "100", "EGP", "cash", "", "admin"]))
    );

    let env = get(&gw, &[("action", "get"), ("sheet", "Income")]);
    let rows = env.data.unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["Amount"], "100");
    assert_eq!(rows[0]["Notes"], "");
}

#[test]
fn all_returns_every_readable_table() {
    let gw = gateway();
    get(&gw, &[("action", "add"), ("sheet", "Income"), ("data", INCOME)]);
    let data = get(&gw, &[("action", "all")]).data.unwrap();
    let Value::Object(map) = data else {
        panic!("expected object");
    };
    let mut keys: Vec<_> = map.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, vec!["Expenses", "Income", "Returns", "Summary", "Workers"]);
    assert_eq!(map["Summary"][2]["EGP"], "100");
}

#[test]
fn add_reports_missing_fields() {
    let gw = gateway();
    let env = get(
        &gw,
        &[("action", "add"), ("sheet", "Expenses"), ("data", r#"{"Amount":"5"}"#)],
    );
    assert_eq!(
        env,
        Envelope::error(
            "Missing required fields for Expenses: Date, Source, Currency, Payment Method, User"
        )
    );
}

#[test]
fn add_rejects_malformed_json() {
    let gw = gateway();
    let env = get(&gw, &[("action", "add"), ("sheet", "Income"), ("data", "{not json")]);
    assert_eq!(env.status, Status::Error);
    assert!(env.message.unwrap().starts_with("Invalid data format"));
}

#[test]
fn add_to_unknown_sheet_is_not_found() {
    let gw = gateway();
    let env = get(&gw, &[("action", "add"), ("sheet", "Salaries"), ("data", INCOME)]);
    assert_eq!(env, Envelope::error("Sheet not found: Salaries"));
}

#[test]
fn delete_by_method_and_index() {
    let gw = gateway();
    get(&gw, &[("action", "add"), ("sheet", "Income"), ("data", INCOME)]);
    let env = gw.dispatch(
        &RequestContext::new(RequestMethod::Delete),
        &params(&[("sheet", "Income"), ("row", "0")]),
    );
    assert_eq!(env, Envelope::ok(Some("Row deleted successfully"), None));
    let env = get(&gw, &[("action", "get"), ("sheet", "Income")]);
    assert_eq!(env.data, Some(json!([])));
}

#[test]
fn delete_out_of_range_and_protected() {
    let gw = gateway();
    let env = get(&gw, &[("action", "delete"), ("sheet", "Income"), ("row", "0")]);
    assert_eq!(env, Envelope::error("Row 0 is out of range (table has 0 rows)"));
    let env = get(&gw, &[("action", "delete"), ("sheet", "Summary"), ("row", "0")]);
    assert_eq!(env, Envelope::error("Sheet Summary is protected"));
    let env = get(&gw, &[("action", "delete"), ("sheet", "Income")]);
    assert_eq!(env, Envelope::error("Missing 'row' parameter"));
}

#[test]
fn jsonp_callback_wraps_body() {
    let gw = gateway();
    let res = gw.handle(
        &RequestContext::new(RequestMethod::Get),
        &params(&[("action", "nope"), ("callback", "handle")]),
    );
    assert_eq!(
        res.body,
        r#"handle({"status":"error","message":"Invalid action"})"#
    );
    assert!(res.content_type.unwrap().starts_with("application/javascript"));
}

#[test]
fn invalid_callback_leaves_store_untouched() {
    let gw = gateway();
    let res = gw.handle(
        &RequestContext::new(RequestMethod::Get),
        &params(&[
            ("action", "add"),
            ("sheet", "Income"),
            ("data", INCOME),
            ("callback", "bad-cb"),
        ]),
    );
    assert_eq!(res.body, r#"{"status":"error","message":"Invalid callback"}"#);
    assert!(res.content_type.unwrap().starts_with("application/json"));

    let env = get(&gw, &[("action", "get"), ("sheet", "Income")]);
    assert_eq!(env.data, Some(json!([])));
}
