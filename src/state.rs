use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::OrmConn,
    events::OrderEvents,
    mail::Mailer,
    payments::{CallbackSigner, GatewayRegistry},
};

#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub gateways: GatewayRegistry,
    pub signer: CallbackSigner,
    pub mailer: Arc<dyn Mailer>,
    pub events: OrderEvents,
}
