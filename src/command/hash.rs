use crate::command::{arg_to_bytes, arg_to_string, wrong_arg_count};
use crate::resp::RespValue;
use crate::store::Store;

pub async fn cmd_hset(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 3 {
        return wrong_arg_count("hset");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::error("ERR invalid key"),
    };
    let field = match arg_to_string(&args[1]) {
        Some(f) => f,
        None => return RespValue::error("ERR invalid field"),
    };
    let value = match arg_to_bytes(&args[2]) {
        Some(v) => v.to_vec(),
        None => return RespValue::error("ERR invalid value"),
    };

    store.hset(key, field, value).await;
    RespValue::ok()
}

pub async fn cmd_hget(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("hget");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::null_bulk_string(),
    };
    let field = match arg_to_string(&args[1]) {
        Some(f) => f,
        None => return RespValue::null_bulk_string(),
    };

    match store.hget(&key, &field).await {
        Some(v) => RespValue::bulk_string(v),
        None => RespValue::null_bulk_string(),
    }
}

/// Flat `[field, value, field, value, ...]` in no particular order, or a
/// null array when the key holds no hash.
pub async fn cmd_hgetall(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("hgetall");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::null_array(),
    };

    match store.hgetall(&key).await {
        Some(pairs) => {
            let mut items = Vec::with_capacity(pairs.len() * 2);
            for (field, value) in pairs {
                items.push(RespValue::bulk_string(field.into_bytes()));
                items.push(RespValue::bulk_string(value));
            }
            RespValue::array(items)
        }
        None => RespValue::null_array(),
    }
}
