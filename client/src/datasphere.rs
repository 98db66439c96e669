// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Datasphere URL builders.
//!
//! The consumption and catalog APIs are plain OData services behind
//! tenant-derived hosts; everything here is URL construction over the same
//! read path. Auth comes from a `datasphere` secret via the OAuth2
//! credential manager.
//!
//! Endpoint layout:
//! - catalog:    `https://{tenant}.{dc}.hcs.cloud.sap/api/v1/dwc/catalog`
//! - relational: `https://{tenant}.{dc}.hcs.cloud.sap/api/v1/dwc/consumption/relational/{space}/{asset}`

use crate::client::ClientContext;
use crate::read::ODataReadBindData;
use odata_bridge_core::AuthParams;
use odata_bridge_core::Result;

/// Base host for a tenant.
pub fn host_url(tenant_name: &str, data_center: &str) -> String {
    format!("https://{tenant_name}.{data_center}.hcs.cloud.sap")
}

/// Catalog service root.
pub fn catalog_url(tenant_name: &str, data_center: &str) -> String {
    format!("{}/api/v1/dwc/catalog", host_url(tenant_name, data_center))
}

/// Catalog collection of spaces.
pub fn spaces_url(tenant_name: &str, data_center: &str) -> String {
    format!("{}/spaces", catalog_url(tenant_name, data_center))
}

/// One space.
pub fn space_url(tenant_name: &str, data_center: &str, space_id: &str) -> String {
    format!("{}/spaces('{space_id}')", catalog_url(tenant_name, data_center))
}

/// Assets of a space.
pub fn assets_url(tenant_name: &str, data_center: &str, space_id: &str) -> String {
    format!("{}/assets", space_url(tenant_name, data_center, space_id))
}

/// One asset.
pub fn asset_url(tenant_name: &str, data_center: &str, space_id: &str, asset_id: &str) -> String {
    format!(
        "{}/assets('{asset_id}')",
        space_url(tenant_name, data_center, space_id)
    )
}

/// Relational consumption service root for an asset.
pub fn relational_service_url(
    tenant_name: &str,
    data_center: &str,
    space_id: &str,
    asset_id: &str,
) -> String {
    format!(
        "{}/api/v1/dwc/consumption/relational/{space_id}/{asset_id}",
        host_url(tenant_name, data_center)
    )
}

/// Entity-set URL of an asset's relational data. Input parameters render in
/// the parameterized-view form `Asset(p1='v1',...)/Set`.
pub fn relational_entity_url(
    tenant_name: &str,
    data_center: &str,
    space_id: &str,
    asset_id: &str,
    params: &[(String, String)],
) -> String {
    let base = relational_service_url(tenant_name, data_center, space_id, asset_id);
    if params.is_empty() {
        return format!("{base}/{asset_id}");
    }
    let rendered = params
        .iter()
        .map(|(key, value)| format!("{key}='{}'", value.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(",");
    format!("{base}/{asset_id}({rendered})/Set")
}

/// `datasphere_read_relational(space_id, asset_id)`: bind a scan over an
/// asset's relational data.
pub fn read_relational(
    context: &ClientContext,
    auth: AuthParams,
    tenant_name: &str,
    data_center: &str,
    space_id: &str,
    asset_id: &str,
    params: &[(String, String)],
) -> Result<ODataReadBindData> {
    let url = relational_entity_url(tenant_name, data_center, space_id, asset_id, params);
    ODataReadBindData::from_entity_set_root(context, &url, auth)
}

/// `datasphere_show_spaces()`: bind a scan over the space catalog.
pub fn show_spaces(
    context: &ClientContext,
    auth: AuthParams,
    tenant_name: &str,
    data_center: &str,
) -> Result<ODataReadBindData> {
    ODataReadBindData::from_entity_set_root(context, &spaces_url(tenant_name, data_center), auth)
}

/// `datasphere_describe_space(space_id)`: bind a scan over one space's
/// catalog entry.
pub fn describe_space(
    context: &ClientContext,
    auth: AuthParams,
    tenant_name: &str,
    data_center: &str,
    space_id: &str,
) -> Result<ODataReadBindData> {
    ODataReadBindData::from_entity_set_root(
        context,
        &space_url(tenant_name, data_center, space_id),
        auth,
    )
}

/// `datasphere_describe_asset(space_id, asset_id)`: bind a scan over one
/// asset's catalog entry.
pub fn describe_asset(
    context: &ClientContext,
    auth: AuthParams,
    tenant_name: &str,
    data_center: &str,
    space_id: &str,
    asset_id: &str,
) -> Result<ODataReadBindData> {
    ODataReadBindData::from_entity_set_root(
        context,
        &asset_url(tenant_name, data_center, space_id, asset_id),
        auth,
    )
}

/// `datasphere_show_assets(space_id)`: bind a scan over a space's assets.
pub fn show_assets(
    context: &ClientContext,
    auth: AuthParams,
    tenant_name: &str,
    data_center: &str,
    space_id: &str,
) -> Result<ODataReadBindData> {
    ODataReadBindData::from_entity_set_root(
        context,
        &assets_url(tenant_name, data_center, space_id),
        auth,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_shapes_are_tenant_derived() {
        assert_eq!(
            catalog_url("acme", "eu10"),
            "https://acme.eu10.hcs.cloud.sap/api/v1/dwc/catalog"
        );
        assert_eq!(
            assets_url("acme", "eu10", "SALES"),
            "https://acme.eu10.hcs.cloud.sap/api/v1/dwc/catalog/spaces('SALES')/assets"
        );
        assert_eq!(
            relational_entity_url("acme", "eu10", "SALES", "ORDERS", &[]),
            "https://acme.eu10.hcs.cloud.sap/api/v1/dwc/consumption/relational/SALES/ORDERS/ORDERS"
        );
    }

    #[test]
    fn input_parameters_render_as_a_parameterized_view() {
        let url = relational_entity_url(
            "acme",
            "eu10",
            "SALES",
            "ORDERS",
            &[("P_YEAR".to_string(), "2024".to_string())],
        );
        assert!(url.ends_with("/ORDERS(P_YEAR='2024')/Set"));
    }
}
