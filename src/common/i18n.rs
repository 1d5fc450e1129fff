// src/common/i18n.rs

use std::{collections::HashMap, sync::Arc};

const DEFAULT_LANG: &str = "en";

// Catálogos embutidos no binário (nada de arquivo solto no deploy)
const CATALOGS: &[(&str, &str)] = &[
    ("en", include_str!("../../locales/en.json")),
    ("az", include_str!("../../locales/az.json")),
    ("pt", include_str!("../../locales/pt.json")),
];

/// Mensagens traduzidas, indexadas por idioma e depois por chave.
#[derive(Clone, Debug)]
pub struct I18nStore {
    catalogs: Arc<HashMap<String, HashMap<String, String>>>,
}

impl I18nStore {
    pub fn load() -> anyhow::Result<Self> {
        let mut catalogs = HashMap::new();
        for (lang, raw) in CATALOGS {
            let messages: HashMap<String, String> = serde_json::from_str(raw)
                .map_err(|e| anyhow::anyhow!("Catálogo '{}' inválido: {}", lang, e))?;
            catalogs.insert(lang.to_string(), messages);
        }

        Ok(Self {
            catalogs: Arc::new(catalogs),
        })
    }

    /// Busca a mensagem no idioma pedido, cai para inglês e, em último caso,
    /// devolve a própria chave.
    pub fn translate(&self, lang: &str, key: &str) -> String {
        self.catalogs
            .get(lang)
            .and_then(|messages| messages.get(key))
            .or_else(|| {
                self.catalogs
                    .get(DEFAULT_LANG)
                    .and_then(|messages| messages.get(key))
            })
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Igual a `translate`, substituindo `{nome}` pelos argumentos.
    pub fn translate_with(&self, lang: &str, key: &str, args: &[(&str, String)]) -> String {
        let mut message = self.translate(lang, key);
        for (name, value) in args {
            message = message.replace(&format!("{{{}}}", name), value);
        }
        message
    }
}
