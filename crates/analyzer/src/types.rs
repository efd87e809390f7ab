use serde::{Deserialize, Serialize};

fn default_stage() -> String {
    "idea".to_string()
}

/// Project under analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venture {
    #[serde(default, alias = "nombre")]
    pub name: String,

    #[serde(default)]
    pub sector: String,

    /// Maturity, e.g. `idea`, `mvp`, `crecimiento`
    #[serde(default = "default_stage", alias = "etapa")]
    pub stage: String,

    #[serde(default, alias = "pais")]
    pub country: String,

    #[serde(default, alias = "descripcion")]
    pub description: String,

    #[serde(default, alias = "problema")]
    pub problem: String,

    #[serde(default, alias = "solucion")]
    pub solution: String,
}

impl Venture {
    /// Text sent to the search service
    pub fn search_query(&self) -> String {
        format!("{} {}", self.description, self.sector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_spanish_keys() {
        let json = r#"{"nombre":"AgroLink","sector":"AgriTech","etapa":"mvp","descripcion":"Marketplace para productores"}"#;
        let venture: Venture = serde_json::from_str(json).unwrap();
        assert_eq!(venture.name, "AgroLink");
        assert_eq!(venture.stage, "mvp");
        assert_eq!(venture.country, "");
        assert_eq!(venture.search_query(), "Marketplace para productores AgriTech");
    }

    #[test]
    fn test_stage_defaults_to_idea() {
        let venture: Venture = serde_json::from_str("{}").unwrap();
        assert_eq!(venture.stage, "idea");
    }
}
