use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{NayaError, Result};

pub const DEFAULT_GATEWAY_ENDPOINT: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "google/gemini-3-flash-preview";
pub const DEFAULT_API_KEY_ENV: &str = "LOVABLE_API_KEY";
pub const DEFAULT_SERVICE_KEY_ENV: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const DEFAULT_ADMIN_PASSWORD_ENV: &str = "NAYA_ADMIN_PASSWORD";
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

const DEFAULT_SYSTEM_PROMPT: &str = "Tu es NaYa, l'assistante virtuelle de Flash Trade International SARL, une entreprise spécialisée dans l'accompagnement à l'importation de produits depuis la Chine vers le Cameroun.

🎯 TON RÔLE:
- Accueillir chaleureusement les visiteurs
- Présenter Flash Trade International et ses services
- Expliquer le fonctionnement des groupages (aérien et maritime) et leurs avantages
- Identifier le profil du prospect (étudiant, commerçant, entrepreneur, débutant)
- Adapter ton discours selon le profil
- Motiver le prospect à passer à l'action
- Aider à estimer un devis approximatif

📦 SERVICES FLASH TRADE:
1. Recherche de fournisseurs en Chine
2. Vérification et contrôle qualité
3. Groupage maritime (économique, 45-60 jours)
4. Groupage aérien (rapide, 7-15 jours)
5. Dédouanement et logistique au Cameroun
6. Formation import-export

💰 ESTIMATION DE PRIX (indicatifs):
- Groupage aérien: environ 8-12 USD/kg
- Groupage maritime: environ 50 000-120 000 FCFA/m³
- Minimum de commande variable selon produit

🎓 FORMATIONS:
- Formation complète import-export: 99 000 FCFA (promo)
- Durée: 3 jours intensifs
- Certificat délivré

📍 CONTACT:
- Localisation: Bonamoussadi, Douala
- WhatsApp: +237 653 207 472 / +237 657 302 129

🔔 RÈGLES IMPORTANTES:
1. Sois toujours positif et encourageant
2. Pose des questions pour mieux comprendre les besoins
3. Tous les prix sont ESTIMATIFS et NON CONTRACTUELS - précise-le toujours
4. Guide vers WhatsApp pour les devis précis
5. Utilise des emojis avec modération pour être accueillant
6. Réponds en français
7. Sois concis mais informatif (max 3-4 phrases par réponse)
8. Quand tu as collecté suffisamment d'infos (produit, quantité, mode transport), propose un résumé de devis

Quand tu génères un devis, structure-le ainsi:
📋 RÉSUMÉ DE VOTRE DEMANDE:
- Produit: [produit]
- Quantité: [quantité]
- Mode de transport: [aérien/maritime]
- Estimation: [prix approximatif]
⚠️ Ce devis est indicatif. Contactez-nous sur WhatsApp pour un devis précis.";

const DEFAULT_GREETING: &str = "Bonjour ! 👋 Je suis NaYa, votre assistante Flash Trade. Comment puis-je vous aider aujourd'hui ? Êtes-vous intéressé par l'importation de produits depuis la Chine ?";

const DEFAULT_FALLBACK: &str = "Désolé, je rencontre un problème technique. Contactez-nous directement sur WhatsApp au +237 653 207 472.";

/// Reads a secret from the environment on every call; blank values count as missing.
pub fn read_secret_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(NayaError::Config(format!("{name} is not configured"))),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GATEWAY_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn api_key(&self) -> Result<String> {
        read_secret_env(&self.api_key_env)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HandoffConfig {
    /// International number without `+` or spaces, as the deep link expects.
    pub phone: String,
    pub intro: String,
    pub outro: String,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            phone: "237653207472".to_string(),
            intro: "Bonjour Flash Trade,\n\nVoici ma conversation avec NaYa:".to_string(),
            outro: "Merci de me recontacter.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Persona {
    pub system_prompt: String,
    pub greeting: String,
    pub fallback_message: String,
    pub client_label: String,
    pub assistant_label: String,
    pub handoff: HandoffConfig,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            fallback_message: DEFAULT_FALLBACK.to_string(),
            client_label: "Client".to_string(),
            assistant_label: "NaYa".to_string(),
            handoff: HandoffConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayMessages {
    pub rate_limited: String,
    pub quota_exceeded: String,
    pub upstream_failure: String,
    pub unknown_error: String,
}

impl Default for RelayMessages {
    fn default() -> Self {
        Self {
            rate_limited: "Trop de requêtes, veuillez réessayer dans un moment.".to_string(),
            quota_exceeded: "Service temporairement indisponible.".to_string(),
            upstream_failure: "Erreur du service IA".to_string(),
            unknown_error: "Erreur inconnue".to_string(),
        }
    }
}

/// Hosted backend used by the provisioning endpoints.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    #[serde(default = "default_service_key_env")]
    pub service_key_env: String,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default = "default_admin_password_env")]
    pub admin_password_env: String,
}

fn default_service_key_env() -> String {
    DEFAULT_SERVICE_KEY_ENV.to_string()
}

fn default_admin_password_env() -> String {
    DEFAULT_ADMIN_PASSWORD_ENV.to_string()
}

impl BackendConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            service_key_env: default_service_key_env(),
            admin_email: None,
            admin_password_env: default_admin_password_env(),
        }
    }

    pub fn service_key(&self) -> Result<String> {
        read_secret_env(&self.service_key_env)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub persona: Persona,
    #[serde(default)]
    pub messages: RelayMessages,
    #[serde(default)]
    pub backend: Option<BackendConfig>,
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
}

impl Config {
    pub fn convention_defaults() -> Self {
        Self {
            idle_timeout_secs: Some(DEFAULT_IDLE_TIMEOUT_SECS),
            ..Self::default()
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| NayaError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| NayaError::Config(format!("{}: {e}", path.display())))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(
            self.idle_timeout_secs
                .unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS)
                .max(1),
        )
    }
}
