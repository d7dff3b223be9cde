//! Session initializer: configures the model session and seeds the
//! conversation with the scripted opening turn so the model speaks first.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::config::Config;
use crate::peer::PeerHandle;
use crate::realtime::{ClientEvent, ConversationItem, SessionConfig};

/// Delay between the model socket opening and the first send; the backend
/// rejects configuration sent in the same instant as the upgrade.
pub const SETTLE_DELAY_MS: u64 = 100;

/// The storefront a call claims to represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanyProfile {
    Shopaz,
    Gjirafa,
}

impl CompanyProfile {
    pub fn name(&self) -> &'static str {
        match self {
            CompanyProfile::Shopaz => "Shopaz",
            CompanyProfile::Gjirafa => "Gjirafa",
        }
    }
}

/// Per-call prompt parameters: which company is calling and for which
/// order. Generated once per call, immutable afterwards.
#[derive(Debug, Clone, Copy)]
pub struct UtteranceContext {
    pub profile: CompanyProfile,
    pub order_id: u32,
}

impl UtteranceContext {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let profile = if rng.gen_bool(0.5) {
            CompanyProfile::Shopaz
        } else {
            CompanyProfile::Gjirafa
        };
        Self {
            profile,
            // 六位订单号
            order_id: rng.gen_range(100_000..1_000_000),
        }
    }

    /// System instructions for the model voice.
    pub fn instructions(&self) -> String {
        format!(
            "Ju jeni një asistent zanor që telefonon nga {company}. Detyra juaj është të konfirmoni porosinë me numër {order}. Flisni shqip. Pasi përdoruesi përgjigjet, ose falënderojeni për konfirmimin ose thojuni se një përfaqësues do t'i kontaktojë. Mbylleni bisedën me \"Mirupafshim!\".",
            company = self.profile.name(),
            order = self.order_id,
        )
    }

    /// The scripted opening turn asking the model to greet the caller.
    pub fn greeting(&self) -> String {
        format!(
            "Përshëndeteni përdoruesin në shqip me \"Përshëndetje, po ju telefonojmë nga {company} për të konfirmuar porosinë tuaj me numër {order}. A është gjithçka në rregull për ta konfirmuar?\"",
            company = self.profile.name(),
            order = self.order_id,
        )
    }
}

/// Send the session configuration followed by the opening turn and a
/// response request.
///
/// Runs after the settle delay. Failures are logged and the call proceeds
/// without the scripted opener; they are never fatal.
pub async fn run_opener(
    config: Arc<Config>,
    context: UtteranceContext,
    model: PeerHandle<ClientEvent>,
) {
    tokio::time::sleep(Duration::from_millis(SETTLE_DELAY_MS)).await;

    log::info!(
        "Initializing model session for {}, order {}",
        context.profile.name(),
        context.order_id,
    );

    let session = SessionConfig::realtime_pcmu(
        &config.model,
        &config.voice,
        context.instructions(),
    );
    if let Err(e) = model.send(ClientEvent::SessionUpdate { session }).await {
        log::warn!("Failed to send session update: {}", e);
        return;
    }

    let item = ConversationItem::user_text(context.greeting());
    if let Err(e) = model
        .send(ClientEvent::ConversationItemCreate { item })
        .await
    {
        log::warn!("Failed to send opening conversation item: {}", e);
        return;
    }

    if let Err(e) = model.send(ClientEvent::ResponseCreate).await {
        log::warn!("Failed to request opening response: {}", e);
    }
}
