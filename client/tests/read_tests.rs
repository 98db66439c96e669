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

//! End-to-end scans over a scripted transport: bind, pushdown, pagination,
//! progress, and schema inference.

use odata_bridge_client::pushdown::CompareOp;
use odata_bridge_client::pushdown::FilterConstant;
use odata_bridge_client::pushdown::TableFilter;
use odata_bridge_client::pushdown::TableFilterSet;
use odata_bridge_client::ClientContext;
use odata_bridge_client::ODataReadBindData;
use odata_bridge_core::AuthParams;
use odata_bridge_core::DataChunk;
use odata_bridge_core::TableType;
use odata_bridge_core::TableValue;
use odata_bridge_mock::MockTransport;
use std::sync::Arc;

const TRIPPIN_METADATA: &str = r#"
  <edmx:Edmx Version="4.0">
    <edmx:DataServices>
      <Schema Namespace="Trippin">
        <EntityType Name="Person">
          <Key><PropertyRef Name="UserName"/></Key>
          <Property Name="UserName" Type="Edm.String" Nullable="false"/>
          <Property Name="Age" Type="Edm.Int32"/>
          <Property Name="Emails" Type="Collection(Edm.String)"/>
        </EntityType>
        <EntityContainer Name="Container">
          <EntitySet Name="People" EntityType="Trippin.Person"/>
        </EntityContainer>
      </Schema>
    </edmx:DataServices>
  </edmx:Edmx>"#;

fn setup(mock: MockTransport) -> (Arc<MockTransport>, ClientContext) {
    let mock = Arc::new(mock);
    let context = ClientContext::new(Arc::clone(&mock) as Arc<dyn odata_bridge_core::HttpTransport>);
    (mock, context)
}

fn bind(context: &ClientContext, url: &str) -> ODataReadBindData {
    ODataReadBindData::from_entity_set_root(context, url, AuthParams::None).unwrap()
}

fn chunk_for(bind_data: &mut ODataReadBindData, capacity: usize) -> DataChunk {
    let types = bind_data.result_types(false).unwrap();
    DataChunk::new(types, capacity)
}

#[test]
fn v4_read_with_projection_pushes_select() {
    let mock = MockTransport::new();
    mock.on_xml("https://host/svc/$metadata", TRIPPIN_METADATA);
    mock.on_json(
        "https://host/svc/People?$select=UserName",
        r#"{"@odata.context":"$metadata#People",
            "value":[{"UserName":"rw","Age":42},{"UserName":"sm","Age":37}]}"#,
    );
    let (mock, context) = setup(mock);

    let mut bind_data = bind(&context, "https://host/svc/People");
    bind_data.activate_columns(&[0]).unwrap();
    bind_data.update_url_from_pushdown().unwrap();
    bind_data.prefetch_first_page().unwrap();

    let mut chunk = chunk_for(&mut bind_data, 2048);
    let emitted = bind_data.fetch_next(&mut chunk).unwrap();
    assert_eq!(emitted, 2);
    assert_eq!(chunk.rows()[0][0], TableValue::Text("rw".to_string()));
    assert_eq!(chunk.rows()[1][0], TableValue::Text("sm".to_string()));
    assert!(!bind_data.has_more());

    let data_requests: Vec<String> = mock
        .requested_urls()
        .into_iter()
        .filter(|url| !url.contains("$metadata"))
        .collect();
    assert_eq!(
        data_requests,
        vec!["https://host/svc/People?$select=UserName".to_string()]
    );
}

#[test]
fn v4_filter_pushdown_renders_the_filter_without_select() {
    let mock = MockTransport::new();
    mock.on_xml("https://host/svc/$metadata", TRIPPIN_METADATA);
    mock.on_json(
        "https://host/svc/People?$filter=Age ge 40 and UserName ne 'zz'",
        r#"{"value":[{"UserName":"rw","Age":42,"Emails":[]}]}"#,
    );
    let (mock, context) = setup(mock);

    let mut bind_data = bind(&context, "https://host/svc/People");
    bind_data.activate_columns(&[0, 1, 2]).unwrap();
    let filters = TableFilterSet::new()
        .with(
            1,
            TableFilter::Comparison {
                op: CompareOp::GreaterThanOrEqual,
                constant: FilterConstant::Integer(40),
            },
        )
        .with(
            0,
            TableFilter::Comparison {
                op: CompareOp::NotEqual,
                constant: FilterConstant::Text("zz".to_string()),
            },
        );
    bind_data.add_filters(&filters).unwrap();
    bind_data.update_url_from_pushdown().unwrap();
    bind_data.prefetch_first_page().unwrap();

    let mut chunk = chunk_for(&mut bind_data, 2048);
    assert_eq!(bind_data.fetch_next(&mut chunk).unwrap(), 1);

    let data_url = mock
        .requested_urls()
        .into_iter()
        .find(|url| !url.contains("$metadata"))
        .unwrap();
    assert!(data_url.contains("$filter=Age ge 40 and UserName ne 'zz'"));
    assert!(!data_url.contains("$select"));
}

#[test]
fn v2_pagination_fills_chunks_across_pages() {
    fn page(rows: std::ops::Range<usize>, next: Option<&str>) -> String {
        let rows: Vec<String> = rows
            .map(|i| format!(r#"{{"Id":{i},"Name":"row{i}"}}"#))
            .collect();
        match next {
            Some(next) => format!(
                r#"{{"d":{{"results":[{}],"__next":"{next}"}}}}"#,
                rows.join(",")
            ),
            None => format!(r#"{{"d":{{"results":[{}]}}}}"#, rows.join(",")),
        }
    }

    let mock = MockTransport::new();
    mock.on_json(
        "https://host/V2/Svc/People",
        page(0..50, Some("People?$skiptoken=P50")),
    );
    mock.on_json("https://host/V2/Svc/People?$skiptoken=P50", page(50..80, None));
    let (_, context) = setup(mock);

    let mut bind_data = bind(&context, "https://host/V2/Svc/People");
    // Inferred columns with no reachable metadata: all text.
    assert_eq!(
        bind_data.result_names(true).unwrap(),
        vec!["Id".to_string(), "Name".to_string()]
    );
    assert_eq!(
        bind_data.result_types(true).unwrap(),
        vec![TableType::Text, TableType::Text]
    );

    let mut chunk = chunk_for(&mut bind_data, 64);
    assert_eq!(bind_data.fetch_next(&mut chunk).unwrap(), 64);
    assert!(bind_data.has_more());
    assert_eq!(bind_data.fetch_next(&mut chunk).unwrap(), 16);
    assert!(!bind_data.has_more());

    assert_eq!(chunk.rows()[0][0], TableValue::Text("64".to_string()));
    assert_eq!(chunk.rows()[15][1], TableValue::Text("row79".to_string()));
}

#[test]
fn v4_count_drives_progress() {
    fn page(first: usize, next: Option<usize>) -> String {
        let rows: Vec<String> = (first..first + 100)
            .map(|i| format!(r#"{{"UserName":"u{i}","Age":{},"Emails":[]}}"#, 20 + i % 50))
            .collect();
        let next = next
            .map(|page| format!(r#","@odata.nextLink":"People?page={page}""#))
            .unwrap_or_default();
        format!(
            r#"{{"@odata.count":1000,"value":[{}]{next}}}"#,
            rows.join(",")
        )
    }

    let mock = MockTransport::new();
    mock.on_xml("https://host/svc/$metadata", TRIPPIN_METADATA);
    mock.on_json("https://host/svc/People", page(0, Some(2)));
    for page_no in 2..=6 {
        mock.on_json(
            format!("https://host/svc/People?page={page_no}"),
            page((page_no - 1) * 100, Some(page_no + 1)),
        );
    }
    let (_, context) = setup(mock);

    let mut bind_data = bind(&context, "https://host/svc/People");
    bind_data.prefetch_first_page().unwrap();

    let mut chunk = chunk_for(&mut bind_data, 100);
    for _ in 0..5 {
        assert_eq!(bind_data.fetch_next(&mut chunk).unwrap(), 100);
    }
    assert_eq!(bind_data.progress_fraction(), 50.0);
}

#[test]
fn first_page_probe_infers_schema_and_avoids_select_on_complex_columns() {
    const ASSET_METADATA: &str = r#"
      <edmx:Edmx Version="4.0">
        <edmx:DataServices>
          <Schema Namespace="NS">
            <ComplexType Name="Location">
              <Property Name="Address" Type="Edm.String"/>
            </ComplexType>
            <EntityType Name="PersonType">
              <Key><PropertyRef Name="UserName"/></Key>
              <Property Name="AddressInfo" Type="Collection(NS.Location)"/>
              <Property Name="UserName" Type="Edm.String" Nullable="false"/>
            </EntityType>
            <EntityContainer Name="Container">
              <EntitySet Name="Entity" EntityType="NS.PersonType"/>
            </EntityContainer>
          </Schema>
        </edmx:DataServices>
      </edmx:Edmx>"#;

    let page = r#"{"@odata.context":"https://tenant.eu10.hcs.cloud.sap/api/$metadata#Entity",
        "value":[{"AddressInfo":[{"Address":"Main St 1"}],"UserName":"rw"}]}"#;

    let mock = MockTransport::new();
    mock.on_xml("https://tenant.eu10.hcs.cloud.sap/api/$metadata", ASSET_METADATA);
    mock.on_json("https://tenant.eu10.hcs.cloud.sap/assets/Entity", page);
    let (mock, context) = setup(mock);

    let mut bind_data = bind(&context, "https://tenant.eu10.hcs.cloud.sap/assets/Entity");

    // Inferred columns in first-row order with metadata-aligned types.
    assert_eq!(
        bind_data.result_names(true).unwrap(),
        vec!["AddressInfo".to_string(), "UserName".to_string()]
    );
    let types = bind_data.result_types(true).unwrap();
    assert!(matches!(&types[0], TableType::List(inner)
        if matches!(inner.as_ref(), TableType::Struct(_))));
    assert_eq!(types[1], TableType::Text);

    // AddressInfo is complex: no $select even under projection.
    bind_data.activate_columns(&[0, 1]).unwrap();
    bind_data.update_url_from_pushdown().unwrap();
    bind_data.prefetch_first_page().unwrap();

    let mut chunk = chunk_for(&mut bind_data, 16);
    assert_eq!(bind_data.fetch_next(&mut chunk).unwrap(), 1);
    let TableValue::List(address_info) = &chunk.rows()[0][0] else {
        panic!("AddressInfo should materialize as a list");
    };
    assert_eq!(
        address_info[0],
        TableValue::Struct(vec![(
            "Address".to_string(),
            TableValue::Text("Main St 1".to_string())
        )])
    );

    assert!(mock
        .requested_urls()
        .iter()
        .all(|url| !url.contains("$select")));
}

#[test]
fn scans_with_top_and_skip_options() {
    let mock = MockTransport::new();
    mock.on_xml("https://host/svc/$metadata", TRIPPIN_METADATA);
    mock.on_json(
        "https://host/svc/People?$top=5&$skip=10",
        r#"{"value":[{"UserName":"u10","Age":30,"Emails":[]}]}"#,
    );
    let (mock, context) = setup(mock);

    let mut bind_data = bind(&context, "https://host/svc/People");
    {
        let helper = bind_data.pushdown_helper().unwrap();
        helper.consume_limit(5);
        helper.consume_offset(10);
    }
    bind_data.update_url_from_pushdown().unwrap();
    bind_data.prefetch_first_page().unwrap();

    let mut chunk = chunk_for(&mut bind_data, 2048);
    assert_eq!(bind_data.fetch_next(&mut chunk).unwrap(), 1);
    assert!(mock
        .requested_urls()
        .iter()
        .any(|url| url.ends_with("People?$top=5&$skip=10")));
}
