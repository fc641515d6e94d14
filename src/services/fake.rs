//! In-memory stand-in for the REST API, good enough to drive the services
//! end to end in tests. Like the real server it stores whatever the client
//! sends and never recomputes prices.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Map, Value};

use crate::api::{response_error, Api, ApiRequest, Payload, Transport};
use crate::error::ApiError;
use crate::models::{Booking, Package, UserAccount};

#[derive(Default)]
struct State {
    bookings: Vec<Value>,
    packages: Vec<Value>,
    portfolios: Vec<Value>,
    photographers: Vec<Value>,
    users: Vec<Value>,
    next_id: u32,
    fail_next: Option<(u16, String)>,
    requests: Vec<(Method, String)>,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<State>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api(&self) -> Api {
        Api::new(Arc::new(self.clone()))
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn fail_next(&self, status: u16, message: &str) {
        self.state.lock().unwrap().fail_next = Some((status, message.to_string()));
    }

    pub fn seed_package(&self, price: f64) -> Package {
        let mut state = self.state.lock().unwrap();
        let id = state.id("package");
        let package = json!({
            "_id": id,
            "photographer": "p1",
            "name": "Portrait",
            "description": "Studio portrait",
            "price": price,
            "duration": "1 hour",
            "includes": ["10 photos"],
            "isActive": true
        });
        state.packages.push(package.clone());
        serde_json::from_value(package).unwrap()
    }

    pub fn seed_booking(&self, package: &Package, status: &str) -> Booking {
        let mut state = self.state.lock().unwrap();
        let id = state.id("booking");
        let booking = json!({
            "_id": id,
            "contactInfo": {"name": "Ann", "email": "ann@example.com", "phone": "555"},
            "photographer": {"_id": "p1", "fullName": "Max Light"},
            "package": {"_id": package.id, "name": package.name},
            "date": "2024-05-20",
            "timeSlot": "9:00 AM - 11:00 AM",
            "location": "Studio",
            "totalPrice": package.price,
            "status": status,
            "paymentStatus": "pending"
        });
        state.bookings.push(booking.clone());
        serde_json::from_value(booking).unwrap()
    }

    pub fn seed_users(&self, users: Vec<UserAccount>) {
        self.state.lock().unwrap().users = users
            .into_iter()
            .map(|u| serde_json::to_value(u).unwrap())
            .collect();
    }

    pub fn seed_photographers(&self, photographers: Vec<Value>) {
        self.state.lock().unwrap().photographers = photographers;
    }
}

fn data(value: Value) -> Value {
    json!({ "data": value })
}

fn not_found() -> ApiError {
    ApiError::Status {
        status: 404,
        message: "Not found".to_string(),
    }
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn find<'a>(records: &'a mut [Value], id: &str) -> Result<&'a mut Value, ApiError> {
    records
        .iter_mut()
        .find(|r| r["_id"] == id)
        .ok_or_else(not_found)
}

fn is_public(segments: &[&str]) -> bool {
    matches!(
        segments,
        ["auth", "login"] | ["auth", "register"] | ["packages", "photographer", _]
            | ["portfolio", "photographer", _] | ["photographers"] | ["photographers", "search"]
    ) || (segments.len() == 2 && segments[0] == "photographers" && segments[1] != "profile")
}

#[async_trait]
impl Transport for FakeApi {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push((request.method.clone(), request.path.clone()));

        if let Some((status, message)) = state.fail_next.take() {
            return Err(ApiError::Status { status, message });
        }

        let segments: Vec<&str> = request.path.trim_matches('/').split('/').collect();
        if !is_public(&segments) && matches!(request.token.as_deref(), None | Some("expired")) {
            return Err(ApiError::Unauthorized);
        }

        let body = match &request.payload {
            Payload::Json(body) => body.clone(),
            _ => Value::Object(Map::new()),
        };

        match (request.method.as_str(), segments.as_slice()) {
            ("POST", ["auth", "login"]) => {
                if body["password"] != "secret" {
                    return Err(response_error(
                        StatusCode::UNAUTHORIZED,
                        r#"{"message":"Invalid credentials"}"#,
                        request.token.is_some(),
                    ));
                }
                Ok(json!({
                    "token": format!("tok-{}", body["email"].as_str().unwrap_or_default()),
                    "role": body["role"],
                    "userId": "user-1"
                }))
            }
            ("POST", ["auth", "register"]) => Ok(json!({
                "token": "tok-registered",
                "user": {
                    "_id": "user-2",
                    "fullName": body["fullName"],
                    "email": body["email"],
                    "role": body["role"]
                }
            })),
            ("GET", ["auth", "me"]) => Ok(data(json!({
                "_id": "user-1",
                "fullName": "Ann",
                "email": "ann@example.com",
                "role": "user"
            }))),

            ("GET", ["bookings"]) | ("GET", ["bookings", "user"]) | ("GET", ["bookings", "photographer"]) => {
                Ok(data(Value::Array(state.bookings.clone())))
            }
            ("POST", ["bookings"]) => {
                let mut booking = body;
                merge(
                    &mut booking,
                    &json!({
                        "_id": state.id("booking"),
                        "status": "pending",
                        "paymentStatus": "pending",
                        "createdAt": "2024-05-01T10:00:00Z"
                    }),
                );
                state.bookings.push(booking.clone());
                Ok(data(booking))
            }
            ("PUT", ["bookings", id]) => {
                let booking = find(&mut state.bookings, id)?;
                merge(booking, &json!({ "status": body["status"] }));
                Ok(data(booking.clone()))
            }
            ("PUT", ["bookings", id, "cancel"]) => {
                let booking = find(&mut state.bookings, id)?;
                merge(booking, &json!({ "status": "cancelled" }));
                Ok(data(booking.clone()))
            }
            ("PUT", ["bookings", id, "reschedule"]) => {
                let booking = find(&mut state.bookings, id)?;
                merge(booking, &json!({ "date": body["date"], "timeSlot": body["timeSlot"] }));
                Ok(data(booking.clone()))
            }
            ("GET", ["bookings", _, "photos"]) => Ok(data(json!([]))),

            ("GET", ["packages"]) => Ok(data(Value::Array(state.packages.clone()))),
            ("GET", ["packages", "photographer", _]) => Ok(data(Value::Array(
                state
                    .packages
                    .iter()
                    .filter(|p| p["isActive"] != false)
                    .cloned()
                    .collect(),
            ))),
            ("POST", ["packages"]) => {
                let mut package = body;
                merge(&mut package, &json!({ "_id": state.id("package"), "photographer": "p1" }));
                state.packages.push(package.clone());
                Ok(data(package))
            }
            ("PUT", ["packages", id]) => {
                let package = find(&mut state.packages, id)?;
                merge(package, &body);
                Ok(data(package.clone()))
            }
            ("DELETE", ["packages", id]) => {
                find(&mut state.packages, id)?;
                state.packages.retain(|p| p["_id"] != *id);
                Ok(json!({ "message": "Package deleted" }))
            }

            ("GET", ["portfolio"]) => Ok(data(Value::Array(state.portfolios.clone()))),
            ("GET", ["portfolio", "photographer", _]) => Ok(data(Value::Array(state.portfolios.clone()))),
            ("POST", ["portfolio"]) => {
                let mut portfolio = body;
                merge(&mut portfolio, &json!({ "_id": state.id("portfolio"), "images": [] }));
                state.portfolios.push(portfolio.clone());
                Ok(data(portfolio))
            }
            ("POST", ["portfolio", id, "images"]) => {
                let uploaded: Vec<Value> = match &request.payload {
                    Payload::Images(images) => images
                        .iter()
                        .map(|i| {
                            json!({
                                "_id": format!("img-{}", i.file_name),
                                "url": format!("/uploads/{}", i.file_name),
                                "isFeatured": false
                            })
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                let portfolio = find(&mut state.portfolios, id)?;
                if let Some(Value::Array(images)) = portfolio.get_mut("images") {
                    images.extend(uploaded);
                }
                Ok(data(portfolio.clone()))
            }
            ("DELETE", ["portfolio", id, "images", image]) => {
                let portfolio = find(&mut state.portfolios, id)?;
                if let Some(Value::Array(images)) = portfolio.get_mut("images") {
                    images.retain(|i| i["_id"] != *image);
                }
                Ok(data(portfolio.clone()))
            }

            ("GET", ["photographers"]) | ("GET", ["photographers", "search"]) => {
                Ok(data(Value::Array(state.photographers.clone())))
            }
            ("PUT", ["photographers", "profile"]) => {
                let mut profile = json!({ "_id": "p1", "fullName": "Max Light" });
                merge(&mut profile, &body);
                Ok(data(profile))
            }
            ("GET", ["photographers", id]) => Ok(data(find(&mut state.photographers, id)?.clone())),

            ("GET", ["admin", "users"]) => Ok(data(Value::Array(state.users.clone()))),
            ("GET", ["admin", "photographers"]) => Ok(data(Value::Array(state.photographers.clone()))),
            ("DELETE", ["admin", "users", id]) => {
                find(&mut state.users, id)?;
                state.users.retain(|u| u["_id"] != *id);
                Ok(json!({ "message": "User deleted" }))
            }
            ("DELETE", ["admin", "photographers", id]) => {
                find(&mut state.photographers, id)?;
                state.photographers.retain(|p| p["_id"] != *id);
                Ok(json!({ "message": "Photographer deleted" }))
            }

            _ => Err(not_found()),
        }
    }
}
