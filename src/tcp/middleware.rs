//! TCP chain stages.

use futures_util::future::BoxFuture;

use super::router::{TcpHandler, TcpSliceContext};
use crate::policy::auth::check_client_ip;
use crate::policy::flow::{check_service_limits, count_service_flow};

/// Count the connection against the gateway and service totals.
pub struct TcpFlowCount;

impl TcpHandler for TcpFlowCount {
    fn serve<'a>(&'a self, ctx: &'a mut TcpSliceContext) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            count_service_flow(&ctx.state, &ctx.service);
        })
    }
}

/// Service-wide and per-client-IP rate limits.
pub struct TcpFlowLimit;

impl TcpHandler for TcpFlowLimit {
    fn serve<'a>(&'a self, ctx: &'a mut TcpSliceContext) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let client_ip = ctx.client_ip();
            if let Err(rejection) = check_service_limits(&ctx.state, &ctx.service, &client_ip) {
                ctx.reject(rejection).await;
            }
        })
    }
}

/// Allow and deny lists.
pub struct TcpIpLists;

impl TcpHandler for TcpIpLists {
    fn serve<'a>(&'a self, ctx: &'a mut TcpSliceContext) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let client_ip = ctx.client_ip();
            if let Err(rejection) = check_client_ip(&ctx.service, &client_ip) {
                ctx.reject(rejection).await;
            }
        })
    }
}
