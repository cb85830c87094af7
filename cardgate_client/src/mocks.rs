use mockall::mock;
use reqwest::Method;

use crate::{CardgateApiError, FieldMap, GatewayClient, GatewayResponse};

mock! {
    pub Gateway {}
    impl GatewayClient for Gateway {
        async fn do_request(
            &self,
            resource: &str,
            data: Option<FieldMap>,
            method: Method,
        ) -> Result<GatewayResponse, CardgateApiError>;
    }
}
