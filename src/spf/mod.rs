pub mod flattener;
pub mod ip_resolver;
pub mod lookup;
pub mod parser;

pub use flattener::{flatten_spf, FlattenOptions, FlattenResult, FlatteningBenefit};
pub use ip_resolver::{ResolvedInclude, SpfIpResolver};
pub use lookup::{resolve_spf, LookupOptions, SpfIncludeChain, SpfLookupResult};
pub use parser::{parse_spf, ParsedSpfRecord};
