//! Canonical fields of a production record and their source headers.

/// One column of the destination table, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    TerritorialLevelCode,
    TerritorialLevel,
    UnitCode,
    Unit,
    Value,
    MunicipalityCode,
    Municipality,
    YearCode,
    Year,
    VariableCode,
    Variable,
    ProductTypeCode,
    ProductType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Text,
    Decimal,
}

impl SqlType {
    pub fn ddl(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Text => "VARCHAR(255)",
            SqlType::Decimal => "NUMERIC(10, 3)",
        }
    }
}

/// Placeholders the source publishes instead of a number:
/// "-" (zero/not applicable), ".." and "..." (not available), or nothing at all.
pub const MISSING_VALUE_TOKENS: [&str; 4] = ["", "-", "..", "..."];

impl Field {
    pub const COUNT: usize = 13;

    pub const ALL: [Field; Field::COUNT] = [
        Field::TerritorialLevelCode,
        Field::TerritorialLevel,
        Field::UnitCode,
        Field::Unit,
        Field::Value,
        Field::MunicipalityCode,
        Field::Municipality,
        Field::YearCode,
        Field::Year,
        Field::VariableCode,
        Field::Variable,
        Field::ProductTypeCode,
        Field::ProductType,
    ];

    /// Position in `Field::ALL`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Header label as published by SIDRA.
    pub fn source_header(self) -> &'static str {
        match self {
            Field::TerritorialLevelCode => "Nível Territorial (Código)",
            Field::TerritorialLevel => "Nível Territorial",
            Field::UnitCode => "Unidade de Medida (Código)",
            Field::Unit => "Unidade de Medida",
            Field::Value => "Valor",
            Field::MunicipalityCode => "Município (Código)",
            Field::Municipality => "Município",
            Field::YearCode => "Ano (Código)",
            Field::Year => "Ano",
            Field::VariableCode => "Variável (Código)",
            Field::Variable => "Variável",
            Field::ProductTypeCode => "Tipo de produto de origem animal (Código)",
            Field::ProductType => "Tipo de produto de origem animal",
        }
    }

    /// Column name in the destination and map tables.
    pub fn column_name(self) -> &'static str {
        match self {
            Field::TerritorialLevelCode => "nivel_territorial_codigo",
            Field::TerritorialLevel => "nivel_territorial",
            Field::UnitCode => "unidade_de_medida_codigo",
            Field::Unit => "unidade_de_medida",
            Field::Value => "valor",
            Field::MunicipalityCode => "municipio_codigo",
            Field::Municipality => "municipio",
            Field::YearCode => "ano_codigo",
            Field::Year => "ano",
            Field::VariableCode => "variavel_codigo",
            Field::Variable => "variavel",
            Field::ProductTypeCode => "tipo_produto_origem_animal_codigo",
            Field::ProductType => "tipo_produto_origem_animal",
        }
    }

    pub fn sql_type(self) -> SqlType {
        match self {
            Field::TerritorialLevel
            | Field::Unit
            | Field::Municipality
            | Field::Variable
            | Field::ProductType => SqlType::Text,
            Field::Value => SqlType::Decimal,
            _ => SqlType::Integer,
        }
    }

    /// Only these fields may carry a missing-value token; it is stored as NULL.
    pub fn accepts_missing_marker(self) -> bool {
        matches!(self, Field::UnitCode | Field::Unit | Field::Value)
    }

    pub fn from_source_header(header: &str) -> Option<Field> {
        Field::ALL
            .into_iter()
            .find(|field| field.source_header() == header)
    }
}
