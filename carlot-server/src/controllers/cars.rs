use std::collections::HashMap;

use axum::{
    extract::Path,
    routing::{get, put},
    Json, Router,
};
use http::StatusCode;

use carlot_slo::{errors, Result};
use carlot_storage::{Car, Status, ID};

use crate::{auth::Auth, valid::Valid, AppState};

pub fn new_router(state: AppState) -> Router {
    Router::new()
        .route("/cars", get(list_cars).post(create_car))
        .route(
            "/cars/:id",
            get(get_car).put(put_car).delete(delete_car),
        )
        .route("/cars/:id/status", put(put_status).get(get_status))
        .with_state(state)
}

async fn list_cars(
    _auth: Auth,
    app: AppState,
) -> Result<Json<HashMap<String, Car>>> {
    let mut cars = HashMap::new();
    for id in app.store.car_ids() {
        let car = app.store.get_car(&id).ok_or_else(|| {
            errors::anyhow(anyhow::anyhow!(
                "have id '{id}', but no matching car"
            ))
        })?;
        cars.insert(id, car);
    }
    Ok(Json(cars))
}

async fn create_car(
    _auth: Auth,
    app: AppState,
    Valid(Json(car)): Valid<Json<Car>>,
) -> Result<(StatusCode, Json<ID>)> {
    let id = app.store.next_car_id();
    let existed = app.store.set_car(&id, car)?;
    app.store.save()?;
    let status = if existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(ID { id })))
}

async fn get_car(
    _auth: Auth,
    app: AppState,
    Path(id): Path<String>,
) -> Result<Json<Car>> {
    let car = app
        .store
        .get_car(&id)
        .ok_or_else(|| errors::not_found(&format!("no such car with ID '{id}'")))?;
    Ok(Json(car))
}

async fn put_car(
    _auth: Auth,
    app: AppState,
    Path(id): Path<String>,
    Valid(Json(car)): Valid<Json<Car>>,
) -> Result<StatusCode> {
    let existed = app.store.set_car(&id, car)?;
    app.store.save()?;
    Ok(if existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    })
}

async fn delete_car(
    _auth: Auth,
    app: AppState,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    app.store.delete_car(&id);
    app.store.save()?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_status(
    _auth: Auth,
    app: AppState,
    Path(id): Path<String>,
) -> Result<Json<Status>> {
    let status = app.store.get_status(&id).ok_or_else(|| {
        errors::not_found(&format!("no status for car with ID '{id}'"))
    })?;
    Ok(Json(status))
}

async fn put_status(
    _auth: Auth,
    app: AppState,
    Path(id): Path<String>,
    Valid(Json(status)): Valid<Json<Status>>,
) -> Result<StatusCode> {
    let existed = app.store.set_status(&id, status)?;
    app.store.save()?;
    Ok(if existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    })
}
