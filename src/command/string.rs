use crate::command::{arg_to_bytes, arg_to_string, wrong_arg_count};
use crate::resp::RespValue;
use crate::store::Store;

pub async fn cmd_get(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("get");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::null_bulk_string(),
    };

    match store.get(&key).await {
        Some(value) => RespValue::bulk_string(value),
        None => RespValue::null_bulk_string(),
    }
}

pub async fn cmd_set(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("set");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::error("ERR invalid key"),
    };
    let value = match arg_to_bytes(&args[1]) {
        Some(v) => v.to_vec(),
        None => return RespValue::error("ERR invalid value"),
    };

    store.set(key, value).await;
    RespValue::ok()
}
