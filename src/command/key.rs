use crate::command::{arg_to_string, wrong_arg_count};
use crate::resp::RespValue;
use crate::store::Store;

/// DEL key: drops the key from whichever keyspaces hold it.
pub async fn cmd_del(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("del");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::error("ERR invalid key"),
    };

    if store.del(&key).await {
        RespValue::ok()
    } else {
        RespValue::simple_string("NOT FOUND")
    }
}
