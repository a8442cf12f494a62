use std::sync::Arc;
use std::thread;

use cashbook::cloud_adapters::MemorySheetsAdapter;
use cashbook::core::{RecordStore, Table};
use cashbook::gateway::{Gateway, Params, RequestContext, RequestMethod, Status};

fn add_params(amount: u32) -> Params {
    let data = format!(
        r#"{{"Date":"2024-01-01","Source":"s","Amount":"{amount}","Currency":"EGP","Payment Method":"cash","User":"u"}}"#
    );
    [("action", "add".to_string()), ("sheet", "Income".to_string()), ("data", data)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[test]
fn concurrent_adds_keep_summary_consistent() {
    let mut store = RecordStore::new(MemorySheetsAdapter::new());
    store.setup().unwrap();
    let gateway = Arc::new(Gateway::new(store));

    let mut handles = Vec::new();
    for i in 1..=10 {
        let gateway = Arc::clone(&gateway);
        handles.push(thread::spawn(move || {
            let env = gateway.dispatch(&RequestContext::new(RequestMethod::Post), &add_params(i));
            assert_eq!(env.status, Status::Ok);
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let ctx = RequestContext::new(RequestMethod::Get);
    let income = gateway.dispatch(
        &ctx,
        &[("action", "get"), ("sheet", Table::Income.sheet_name())]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    );
    assert_eq!(income.data.unwrap().as_array().unwrap().len(), 10);

    let summary = gateway.dispatch(
        &ctx,
        &[("action", "get"), ("sheet", "Summary")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    );
    assert_eq!(summary.data.unwrap()[0]["EGP"], "55");
}
