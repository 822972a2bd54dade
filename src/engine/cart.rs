use std::num::NonZeroU32;

use chrono::Duration;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::error::StoreResultExt;
use super::{Engine, EngineError};

impl Engine {
    /// Find the live cart for a user, or failing that a guest token.
    /// Expired sessions are dropped on sight and read as absent.
    pub(super) async fn find_cart(
        &self,
        user_id: Option<Id>,
        session_token: Option<&str>,
    ) -> Result<Option<CartSession>, EngineError> {
        let carts = &self.repos.carts;
        let found = match (user_id, session_token) {
            (Some(uid), _) => carts.find_session_by_user(uid).await.context("find cart by user")?,
            (None, Some(token)) => carts.find_session_by_token(token).await.context("find cart by token")?,
            (None, None) => None,
        };
        match found {
            Some(session) if session.is_expired(self.now()) => {
                debug!("dropping expired cart session {}", session.id);
                carts.delete_session(session.id).await.context("drop expired cart")?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn cart_result(&self, session: CartSession) -> Result<CartResult, EngineError> {
        let items = self
            .repos
            .carts
            .list_items(session.id)
            .await
            .context("list cart items")?;
        let subtotal = items.iter().map(CartItem::line_total).sum();
        Ok(CartResult {
            session,
            items,
            subtotal,
        })
    }

    async fn require_cart(&self, user_id: Option<Id>, session_token: Option<&str>) -> Result<CartSession, EngineError> {
        self.find_cart(user_id, session_token)
            .await?
            .ok_or_else(|| EngineError::not_exist("cart not found"))
    }

    /// Resolve the cart for a signed-in user or guest token, creating one if
    /// neither matches. New guest carts get a fresh opaque token.
    pub async fn get_or_create_cart(
        &self,
        user_id: Option<Id>,
        session_token: Option<&str>,
    ) -> Result<CartResult, EngineError> {
        if let Some(session) = self.find_cart(user_id, session_token).await? {
            return self.cart_result(session).await;
        }
        let owner = match user_id {
            Some(uid) => CartOwner::User(uid),
            None => CartOwner::Guest(Ulid::new().to_string()),
        };
        let expires_at = self.now() + Duration::days(self.config.cart_ttl_days);
        let session = self
            .repos
            .carts
            .create_session(owner, expires_at)
            .await
            .context("create cart session")?;
        debug!("created cart session {}", session.id);
        Ok(CartResult {
            session,
            items: Vec::new(),
            subtotal: 0,
        })
    }

    /// Category used to price a cart line. Guests cannot attach vehicles.
    async fn cart_vehicle_category(&self, user_id: Option<Id>, vehicle_id: Option<Id>) -> Result<Option<Id>, EngineError> {
        let Some(vehicle_id) = vehicle_id else {
            return Ok(None);
        };
        let Some(user_id) = user_id else {
            return Err(EngineError::unauthorized("sign in to attach a vehicle").with_detail("vehicle_id", vehicle_id));
        };
        let profile = self.load_profile(user_id).await?;
        Ok(self.load_vehicle_for(&profile, vehicle_id).await?.category_id)
    }

    pub async fn add_item(
        &self,
        user_id: Option<Id>,
        session_token: Option<&str>,
        service_id: Id,
        vehicle_id: Option<Id>,
        quantity: NonZeroU32,
        option_ids: &[Id],
    ) -> Result<CartResult, EngineError> {
        if quantity.get() > MAX_QUANTITY {
            return Err(EngineError::invalid("quantity too large").with_detail("max", MAX_QUANTITY));
        }
        if option_ids.len() > MAX_OPTIONS_PER_ITEM {
            return Err(EngineError::invalid("too many options on one item").with_detail("max", MAX_OPTIONS_PER_ITEM));
        }
        let category = self.cart_vehicle_category(user_id, vehicle_id).await?;
        let line = self.price_line(service_id, option_ids, category).await?;
        if !line.service.is_active {
            return Err(EngineError::invalid("service is not currently offered").with_detail("service_id", service_id));
        }

        let cart = self.get_or_create_cart(user_id, session_token).await?;
        if cart.items.len() >= MAX_CART_ITEMS {
            return Err(EngineError::invalid("cart is full").with_detail("max", MAX_CART_ITEMS));
        }
        let options = line
            .options
            .iter()
            .map(|o| CartItemOption {
                option_id: o.id,
                price: o.base_price,
            })
            .collect();
        let item = self
            .repos
            .carts
            .add_item(
                cart.session.id,
                service_id,
                vehicle_id,
                quantity.get(),
                line.unit_price(),
                options,
            )
            .await
            .context("add cart item")?;
        info!("cart {}: added service {} x{}", cart.session.id, service_id, item.quantity);
        self.cart_result(cart.session).await
    }

    async fn owned_item(&self, session: &CartSession, item_id: Id) -> Result<CartItem, EngineError> {
        match self.repos.carts.get_item(item_id).await.context("load cart item")? {
            Some(item) if item.session_id == session.id => Ok(item),
            _ => Err(EngineError::not_exist("cart item not found").with_detail("item_id", item_id)),
        }
    }

    /// Last write wins; there is no per-cart locking.
    pub async fn update_item_quantity(
        &self,
        user_id: Option<Id>,
        session_token: Option<&str>,
        item_id: Id,
        quantity: NonZeroU32,
    ) -> Result<CartResult, EngineError> {
        if quantity.get() > MAX_QUANTITY {
            return Err(EngineError::invalid("quantity too large").with_detail("max", MAX_QUANTITY));
        }
        let session = self.require_cart(user_id, session_token).await?;
        self.owned_item(&session, item_id).await?;
        self.repos
            .carts
            .update_item_quantity(item_id, quantity.get())
            .await
            .context("update cart item quantity")?;
        self.cart_result(session).await
    }

    pub async fn remove_item(
        &self,
        user_id: Option<Id>,
        session_token: Option<&str>,
        item_id: Id,
    ) -> Result<CartResult, EngineError> {
        let session = self.require_cart(user_id, session_token).await?;
        self.owned_item(&session, item_id).await?;
        self.repos
            .carts
            .delete_item(item_id)
            .await
            .context("remove cart item")?;
        self.cart_result(session).await
    }

    pub async fn clear_cart(&self, user_id: Option<Id>, session_token: Option<&str>) -> Result<CartResult, EngineError> {
        let session = self.require_cart(user_id, session_token).await?;
        self.repos
            .carts
            .clear_items(session.id)
            .await
            .context("clear cart")?;
        self.cart_result(session).await
    }

    /// Move a guest cart's lines into the user's cart after sign-in.
    /// Prices are carried over as quoted to the guest.
    pub async fn claim_guest_cart(&self, user_id: Id, session_token: &str) -> Result<CartResult, EngineError> {
        let Some(guest) = self.find_cart(None, Some(session_token)).await? else {
            return self.get_or_create_cart(Some(user_id), None).await;
        };
        let cart = self.get_or_create_cart(Some(user_id), None).await?;
        let guest_items = self
            .repos
            .carts
            .list_items(guest.id)
            .await
            .context("list guest cart items")?;
        if cart.items.len() + guest_items.len() > MAX_CART_ITEMS {
            return Err(EngineError::invalid("cart is full").with_detail("max", MAX_CART_ITEMS));
        }
        let moved = guest_items.len();
        for item in guest_items {
            self.repos
                .carts
                .add_item(
                    cart.session.id,
                    item.service_id,
                    item.vehicle_id,
                    item.quantity,
                    item.unit_price,
                    item.options,
                )
                .await
                .context("move guest cart item")?;
        }
        self.repos
            .carts
            .delete_session(guest.id)
            .await
            .context("delete guest cart")?;
        info!("user {user_id} claimed guest cart {} ({moved} items)", guest.id);
        self.cart_result(cart.session).await
    }

    /// Delete every expired cart session. Returns how many were removed.
    pub async fn purge_expired_carts(&self) -> Result<usize, EngineError> {
        self.repos
            .carts
            .delete_expired_sessions(self.now())
            .await
            .context("purge expired carts")
    }
}
