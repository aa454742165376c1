use crate::policy::{Actor, CommentPolicy, Policy, PostPolicy};
use crate::post::PostForTemplate;
use crate::session::authenticate_client_by_session;
use crate::site_time::SiteTime;
use crate::user::ClientUser;
use actix_session::Session;
use actix_utils::future::{ok, Ready};
use actix_web::dev::{
    forward_ready, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use chrono::{NaiveDateTime, Utc};
use futures_util::future::{FutureExt as _, LocalBoxFuture};
use sea_orm::DatabaseConnection;
use std::time::{Duration, Instant};
use std::{cell::RefCell, rc::Rc};

/// Client data stored for a single request cycle.
/// Distinct from ClientCtx because it is defined through request data.
#[derive(Clone, Debug)]
pub struct ClientCtxInner {
    pub client: Option<ClientUser>,
    pub site_time: SiteTime,
    pub request_start: Instant,
}

impl Default for ClientCtxInner {
    fn default() -> Self {
        Self {
            client: None,
            site_time: SiteTime::utc(),
            request_start: Instant::now(),
        }
    }
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
///
/// Handlers pass `client.actor()` into operations explicitly; the helpers
/// below only exist so templates can decide which links to show.
#[derive(Clone, Debug, Default)]
pub struct ClientCtx(Rc<RefCell<ClientCtxInner>>);

impl ClientCtx {
    /// Context for an already known user. Used where no request is involved.
    pub fn from_user(user: Option<ClientUser>, site_time: SiteTime) -> Self {
        Self(Rc::new(RefCell::new(ClientCtxInner {
            client: user,
            site_time,
            request_start: Instant::now(),
        })))
    }

    fn get_client_ctx(extensions: &mut Extensions) -> Self {
        match extensions.get::<Rc<RefCell<ClientCtxInner>>>() {
            // Existing record in extensions; pull it.
            Some(s_impl) => Self(Rc::clone(s_impl)),
            // No existing record; create and insert it.
            None => {
                let inner = Rc::new(RefCell::new(ClientCtxInner::default()));
                extensions.insert(inner.clone());
                Self(inner)
            }
        }
    }

    /// Context already attached to a request, e.g. while rendering an error page.
    pub fn get_from_request(req: &HttpRequest) -> Self {
        Self::get_client_ctx(&mut req.extensions_mut())
    }

    pub fn actor(&self) -> Actor {
        Actor::from_id(self.get_id())
    }

    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<i32> {
        self.0.borrow().client.as_ref().map(|u| u.id)
    }

    pub fn get_user(&self) -> Option<ClientUser> {
        self.0.borrow().client.clone()
    }

    /// Returns either the user's name or the word for guest.
    pub fn get_name(&self) -> String {
        let user = &self.0.borrow().client;
        match user {
            Some(user) => user.name.to_owned(),
            None => "Guest".to_owned(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.0.borrow().client.is_some()
    }

    pub fn site_time(&self) -> SiteTime {
        self.0.borrow().site_time
    }

    /// A stored UTC instant in the site's wall-clock time.
    pub fn display_time(&self, utc: NaiveDateTime) -> String {
        self.site_time().display(utc)
    }

    pub fn site_time_label(&self) -> String {
        self.site_time().label()
    }

    pub fn profile_url(&self) -> String {
        crate::url::profile(&self.get_name())
    }

    pub fn can_edit_post(&self, post: &PostForTemplate) -> bool {
        PostPolicy::at(Utc::now().naive_utc()).can_edit(self.actor(), post)
    }

    pub fn can_edit_comment(&self, comment: &crate::comment::CommentForTemplate) -> bool {
        CommentPolicy { post_visible: true }.can_edit(self.actor(), comment)
    }

    /// Returns Duration representing request time.
    pub fn request_time(&self) -> Duration {
        Instant::now() - self.0.borrow().request_start
    }

    /// Returns human readable representing request time.
    pub fn request_time_as_string(&self) -> String {
        let us = self.request_time().as_micros();
        if us > 5000 {
            format!("{}ms", us / 1000)
        } else {
            format!("{}μs", us)
        }
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    /// The associated error which can be returned.
    type Error = Error;
    /// Future that resolves to a Self.
    type Future = Ready<Result<Self, Self::Error>>;

    /// Create a Self from request parts asynchronously.
    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ok(ClientCtx::get_from_request(req))
    }
}

impl<S, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ClientCtxMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ClientCtxMiddleware { service })
    }
}

/// Client context middleware
pub struct ClientCtxMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Borrows of `req` must be done in a precise way to avoid conflcits. This order is important.
        let (httpreq, payload) = req.into_parts();
        let session = Session::extract(&httpreq).into_inner();
        let req = ServiceRequest::from_parts(httpreq, payload);
        let db = req.app_data::<Data<DatabaseConnection>>().cloned();
        let ctx = ClientCtx::get_client_ctx(&mut req.extensions_mut());
        if let Some(site_time) = req.app_data::<Data<SiteTime>>() {
            ctx.0.borrow_mut().site_time = *site_time.get_ref();
        }
        // The handler future does nothing until polled, so the user is resolved first.
        let fut = self.service.call(req);

        async move {
            match (session, db) {
                (Ok(session), Some(db)) => {
                    let client = authenticate_client_by_session(&session, &db).await;
                    ctx.0.borrow_mut().client = client;
                }
                (Err(e), _) => {
                    log::error!("ClientCtxMiddleware: Session::extract(): {}", e);
                }
                (_, None) => {
                    log::warn!("ClientCtxMiddleware: no DatabaseConnection in app data.");
                }
            };
            fut.await
        }
        .boxed_local()
    }
}
