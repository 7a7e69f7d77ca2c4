use crate::configuration::Settings;
use crate::startup::BoundAddress;
use actix_web::http::header;
use actix_web::{get, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

/// Discovery document served at `/help`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Discovery {
    pub mcp_servers: Vec<String>,
    pub client_example: String,
}

impl Discovery {
    pub fn new(settings: &Settings, bound: &BoundAddress) -> Self {
        Self {
            mcp_servers: vec![settings.mcp_endpoint_url(bound.port)],
            client_example: settings.client_example.clone(),
        }
    }
}

#[tracing::instrument(name = "Redirect to discovery")]
#[get("/")]
pub async fn root_handler() -> impl Responder {
    HttpResponse::TemporaryRedirect()
        .insert_header((header::LOCATION, "/help"))
        .finish()
}

#[tracing::instrument(name = "Discovery document", skip_all)]
#[get("/help")]
pub async fn help_handler(
    settings: web::Data<Settings>,
    bound: web::Data<BoundAddress>,
) -> impl Responder {
    web::Json(Discovery::new(&settings, &bound))
}
