use chrono::Utc;
use uuid::Uuid;

use crate::{
    EngineError, Fund, ResultEngine,
    commands::{NewFundCmd, UpdateFundCmd},
    util::normalize_required_text,
};

use super::{Engine, fund_error};

impl Engine {
    pub async fn create_fund(&self, cmd: NewFundCmd) -> ResultEngine<Fund> {
        let fund = Fund::new(
            self.ids.generate(),
            &cmd.name,
            &cmd.description,
            cmd.category,
            cmd.risk,
            cmd.performance,
            cmd.total,
            Utc::now(),
        )?;
        self.store.insert_fund(&fund).await?;
        Ok(fund)
    }

    pub async fn fund(&self, id: Uuid) -> ResultEngine<Fund> {
        self.read(id, "get_fund", || self.store.get_fund(id))
            .await
            .map_err(|err| fund_error(err, id))
    }

    /// Every fund, ordered by name.
    pub async fn funds(&self) -> ResultEngine<Vec<Fund>> {
        self.read(Uuid::nil(), "list_funds", || self.store.list_funds())
            .await
            .map_err(EngineError::from)
    }

    /// Change name and description. Totals and revision-guarded balances are
    /// left alone.
    pub async fn update_fund(&self, cmd: UpdateFundCmd) -> ResultEngine<Fund> {
        let name = normalize_required_text(&cmd.name, "fund name")?;
        let description = normalize_required_text(&cmd.description, "fund description")?;
        self.store
            .update_fund_details(cmd.fund_id, &name, &description, Utc::now())
            .await
            .map_err(|err| fund_error(err, cmd.fund_id))
    }
}
