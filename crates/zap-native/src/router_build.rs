use zap_config::Config;
use zap_router::{RouteEntry, RouteTable, RoutingError};

/// Pseudo HTTP method WebSocket-kind routes are compiled under, mirroring
/// the script-side registry's own route table for the same paths.
pub const WS_METHOD: &str = "WS";

/// Split the configuration's flat route list into the ordinary HTTP table
/// and the WebSocket-upgrade table, then compile each.
pub fn compile(config: &Config) -> Result<(RouteTable, RouteTable), RoutingError> {
    let mut http_entries = Vec::new();
    let mut ws_entries = Vec::new();

    for route in &config.routes {
        let entry = RouteEntry {
            method: if route.is_websocket { WS_METHOD.to_string() } else { route.method.clone() },
            pattern: route.path.clone(),
            handler_id: route.handler_id.clone(),
            is_script: route.is_script,
        };
        if route.is_websocket {
            ws_entries.push(entry);
        } else {
            http_entries.push(entry);
        }
    }

    let http_table = RouteTable::compile(&http_entries)?;
    let ws_table = RouteTable::compile(&ws_entries)?;
    Ok((http_table, ws_table))
}
