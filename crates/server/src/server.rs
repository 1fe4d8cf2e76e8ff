use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, Error as AxumError, Header, authorization::Basic},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use std::sync::Arc;

use crate::{catalog, payments, public, rentals, reservations, user};
use engine::Engine;

static FORWARDED_FOR_HEADER: axum::http::HeaderName =
    axum::http::HeaderName::from_static("x-forwarded-for");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub db: DatabaseConnection,
}

/// `TypedHeader` for the caller address set by the reverse proxy.
///
/// Only the first (client-most) address of "x-forwarded-for" is kept.
#[derive(Debug)]
pub struct ForwardedFor(pub String);

impl Header for ForwardedFor {
    fn name() -> &'static axum::http::HeaderName {
        &FORWARDED_FOR_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        let first = value.split(',').next().unwrap_or_default().trim();
        if first.is_empty() {
            return Err(AxumError::invalid());
        }

        Ok(ForwardedFor(first.to_string()))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        match axum::http::HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode x-forwarded-for header"),
        }
    }
}

async fn auth(
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(TypedHeader(auth_header)) = auth_header else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    if auth_header.username().is_empty() || auth_header.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user: Option<user::Model> = user::Entity::find()
        .filter(user::Column::Username.eq(auth_header.username()))
        .filter(user::Column::Password.eq(auth_header.password()))
        .one(&state.db)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let Some(user) = user else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    let public = Router::new()
        .route("/public/reservations", post(public::reservation_new))
        .route(
            "/public/vehicles/{id}/availability",
            get(public::availability),
        );

    Router::new()
        .route(
            "/reservations",
            post(reservations::create).get(reservations::list),
        )
        .route(
            "/reservations/{id}",
            get(reservations::get).patch(reservations::update),
        )
        .route("/reservations/{id}/accept", post(reservations::accept))
        .route("/reservations/{id}/reject", post(reservations::reject))
        .route("/reservations/{id}/start", post(rentals::start))
        .route("/reservations/{id}/end", post(reservations::end))
        .route(
            "/reservations/{id}/payments",
            post(payments::reservation_new).get(payments::reservation_list),
        )
        .route(
            "/reservations/{id}/payment-status",
            post(payments::status_update),
        )
        .route("/rentals/{id}", get(rentals::get))
        .route("/rentals/{id}/extend", post(rentals::extend))
        .route("/rentals/{id}/terminate", post(rentals::terminate))
        .route("/rentals/{id}/payments", post(payments::rental_new))
        .route("/rentals/{id}/contract", post(rentals::contract))
        .route("/payments/{id}/complete", post(payments::complete))
        .route("/payments/{id}/void", post(payments::void))
        .route(
            "/vehicles",
            post(catalog::vehicle_new).get(catalog::vehicle_list),
        )
        .route(
            "/vehicles/{id}/maintenance",
            patch(catalog::vehicle_maintenance),
        )
        .route("/clients", post(catalog::client_new))
        .route("/clients/{id}", get(catalog::client_get))
        .route("/ledger/reconcile", post(catalog::reconcile))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .merge(public)
        .with_state(state)
}

pub async fn run_with_listener(
    engine: Arc<Engine>,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState { engine, db };

    axum::serve(listener, router(state)).await
}
