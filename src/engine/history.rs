use futures::future::try_join_all;
use tracing::info;

use crate::limits::*;
use crate::model::*;

use super::conflict::check_len;
use super::error::StoreResultExt;
use super::{Engine, EngineError};

impl Engine {
    /// Open the service record for a completed booking. One record per booking.
    pub async fn create_service_record(
        &self,
        admin_user_id: Id,
        booking_id: Id,
        summary: Option<String>,
    ) -> Result<ServiceRecord, EngineError> {
        self.require_admin(admin_user_id).await?;
        if let Some(s) = &summary {
            check_len("summary", s, MAX_NOTES_LEN)?;
        }
        let booking = self.load_booking(booking_id).await?;
        if booking.status != BookingStatus::Completed {
            return Err(EngineError::invalid(format!("booking is {}, not completed", booking.status))
                .with_detail("booking_id", booking_id));
        }
        let history = &self.repos.history;
        if let Some(existing) = history
            .get_service_record_by_booking(booking_id)
            .await
            .context("load service record")?
        {
            return Err(EngineError::invalid("booking already has a service record")
                .with_detail("booking_id", booking_id)
                .with_detail("record_id", existing.id));
        }
        let record = history
            .create_service_record(
                NewServiceRecord {
                    booking_id,
                    customer_id: booking.customer_id,
                    vehicle_id: booking.vehicle_id,
                    summary,
                },
                self.now(),
            )
            .await
            .context("create service record")?;
        info!("service record {} opened for booking {booking_id}", record.id);
        Ok(record)
    }

    async fn load_record(&self, record_id: Id) -> Result<ServiceRecord, EngineError> {
        self.repos
            .history
            .get_service_record(record_id)
            .await
            .context("load service record")?
            .ok_or_else(|| EngineError::not_exist("service record not found").with_detail("record_id", record_id))
    }

    /// `note_type` must be one of `condition`, `treatment`, `recommendation`, `follow_up`.
    pub async fn add_service_note(
        &self,
        admin_user_id: Id,
        record_id: Id,
        note_type: &str,
        body: &str,
        is_visible_to_customer: bool,
    ) -> Result<ServiceNote, EngineError> {
        self.require_admin(admin_user_id).await?;
        let note_type: NoteType = note_type
            .parse()
            .map_err(|e: String| EngineError::invalid(e).with_detail("note_type", note_type))?;
        if body.trim().is_empty() {
            return Err(EngineError::invalid("note body is empty"));
        }
        check_len("body", body, MAX_NOTE_BODY_LEN)?;
        self.load_record(record_id).await?;
        let note = self
            .repos
            .history
            .add_note(record_id, note_type, body.to_string(), is_visible_to_customer, self.now())
            .await
            .context("add service note")?;
        info!("record {record_id}: note {} added", note.id);
        Ok(note)
    }

    pub async fn add_product_used(
        &self,
        admin_user_id: Id,
        record_id: Id,
        product_name: &str,
        quantity: Option<String>,
    ) -> Result<ServiceProductUsed, EngineError> {
        self.require_admin(admin_user_id).await?;
        if product_name.trim().is_empty() {
            return Err(EngineError::invalid("product name is empty"));
        }
        check_len("product_name", product_name, MAX_PRODUCT_NAME_LEN)?;
        if let Some(q) = &quantity {
            check_len("quantity", q, MAX_PRODUCT_NAME_LEN)?;
        }
        self.load_record(record_id).await?;
        self.repos
            .history
            .add_product_used(record_id, product_name.to_string(), quantity)
            .await
            .context("add product used")
    }

    pub async fn add_service_photo(
        &self,
        admin_user_id: Id,
        record_id: Id,
        url: &str,
        caption: Option<String>,
    ) -> Result<ServicePhoto, EngineError> {
        self.require_admin(admin_user_id).await?;
        if url.trim().is_empty() {
            return Err(EngineError::invalid("photo url is empty"));
        }
        check_len("url", url, MAX_URL_LEN)?;
        if let Some(c) = &caption {
            check_len("caption", c, MAX_REASON_LEN)?;
        }
        self.load_record(record_id).await?;
        self.repos
            .history
            .add_photo(record_id, url.to_string(), caption)
            .await
            .context("add service photo")
    }

    async fn record_detail(&self, record: ServiceRecord, include_hidden: bool) -> Result<ServiceRecordDetail, EngineError> {
        let history = &self.repos.history;
        let (mut notes, products, photos) = futures::try_join!(
            async { history.list_notes(record.id).await.context("list service notes") },
            async { history.list_products_used(record.id).await.context("list products used") },
            async { history.list_photos(record.id).await.context("list service photos") },
        )?;
        if !include_hidden {
            notes.retain(|n| n.is_visible_to_customer);
        }
        Ok(ServiceRecordDetail {
            record,
            notes,
            products,
            photos,
        })
    }

    async fn history_for(&self, customer_id: Id, include_hidden: bool) -> Result<Vec<ServiceRecordDetail>, EngineError> {
        let records = self
            .repos
            .history
            .list_service_records_by_customer(customer_id)
            .await
            .context("list service records")?;
        try_join_all(records.into_iter().map(|r| self.record_detail(r, include_hidden))).await
    }

    /// The caller's service history. Staff-only notes are hidden unless the caller is an admin.
    pub async fn list_my_history(&self, user_id: Id) -> Result<Vec<ServiceRecordDetail>, EngineError> {
        let profile = self.load_profile(user_id).await?;
        let include_hidden = self.is_admin(user_id).await?;
        self.history_for(profile.id, include_hidden).await
    }

    /// Full history of one customer, hidden notes included.
    pub async fn list_customer_history(
        &self,
        admin_user_id: Id,
        customer_id: Id,
    ) -> Result<Vec<ServiceRecordDetail>, EngineError> {
        self.require_admin(admin_user_id).await?;
        self.history_for(customer_id, true).await
    }

    /// Admins see any record in full; customers only their own, visible notes only.
    pub async fn get_service_record(&self, user_id: Id, record_id: Id) -> Result<ServiceRecordDetail, EngineError> {
        let record = self.load_record(record_id).await?;
        if self.is_admin(user_id).await? {
            return self.record_detail(record, true).await;
        }
        let profile = self.load_profile(user_id).await?;
        if record.customer_id != profile.id {
            return Err(EngineError::not_exist("service record not found").with_detail("record_id", record_id));
        }
        self.record_detail(record, false).await
    }
}
