//! Catalog metadata queries.
//!
//! Every query returns one JSON object per row (`jsonb_strip_nulls` of the
//! row's `to_jsonb`), with column aliases matching the wire attribute
//! names so that rows decode directly into the object structs. Oids are
//! cast to `int8` because `to_jsonb` renders the `oid` type as a string.

use crate::key::ObjectKind;

/// Oldest supported server (`server_version_num`).
pub const MIN_SERVER_VERSION: u32 = 100_000;

const USER_SCHEMA: &str = "n.nspname NOT IN ('pg_catalog', 'information_schema', 'pg_toast') \
     AND n.nspname NOT LIKE 'pg\\_temp\\_%' AND n.nspname NOT LIKE 'pg\\_toast\\_temp\\_%'";

fn json_rows(inner: &str) -> String {
    format!("SELECT jsonb_strip_nulls(to_jsonb(q))::text FROM (\n{inner}\n) q")
}

fn not_extension_member(catalog: &str, oid: &str) -> String {
    format!(
        "NOT EXISTS (SELECT 1 FROM pg_depend x WHERE x.classid = '{catalog}'::regclass \
         AND x.objid = {oid} AND x.deptype = 'e')"
    )
}

fn nullable_proc(column: &str, alias: &str) -> String {
    format!("CASE WHEN {column} != 0 THEN {column}::regproc::text END AS {alias}")
}

/// Named-list JSON (`[{name: {type: ...}}]`) of the attributes of the
/// relation `relid`.
fn attribute_list(relid: &str, with_collation: bool) -> String {
    let collation = if with_collation {
        ", 'collation', CASE WHEN a.attcollation != 0 AND a.attcollation != at.typcollation \
         THEN (SELECT collname FROM pg_collation WHERE oid = a.attcollation) END"
    } else {
        ""
    };
    format!(
        "(SELECT jsonb_agg(jsonb_build_object(a.attname, jsonb_build_object(\
         'type', format_type(a.atttypid, a.atttypmod){collation})) ORDER BY a.attnum) \
         FROM pg_attribute a JOIN pg_type at ON a.atttypid = at.oid \
         WHERE a.attrelid = {relid} AND a.attnum > 0 AND NOT a.attisdropped)"
    )
}

fn key_columns(relid: &str, keys: &str) -> String {
    format!(
        "ARRAY(SELECT a.attname FROM unnest({keys}) WITH ORDINALITY k(attnum, ord) \
         JOIN pg_attribute a ON a.attrelid = {relid} AND a.attnum = k.attnum \
         ORDER BY k.ord)::text[]"
    )
}

fn owner(column: &str) -> String {
    format!("pg_get_userbyid({column}) AS owner")
}

fn description(oid: &str, catalog: &str) -> String {
    format!("obj_description({oid}, '{catalog}') AS description")
}

/// Metadata query for one object kind. Columns have their own query
/// ([`columns`]) and are attached to their tables after loading.
#[must_use]
pub fn object_query(kind: ObjectKind, version: u32) -> Option<String> {
    let inner = match kind {
        ObjectKind::Schema => format!(
            "SELECT n.oid::int8 AS oid, n.nspname AS name, {}, n.nspacl::text[] AS acl, {}
             FROM pg_namespace n
             WHERE {USER_SCHEMA} AND {}
             ORDER BY n.nspname",
            owner("n.nspowner"),
            description("n.oid", "pg_namespace"),
            not_extension_member("pg_namespace", "n.oid"),
        ),
        ObjectKind::Extension => format!(
            "SELECT e.oid::int8 AS oid, e.extname AS name, n.nspname AS schema,
                    e.extversion AS version, {}
             FROM pg_extension e JOIN pg_namespace n ON e.extnamespace = n.oid
             WHERE e.extname != 'plpgsql'
             ORDER BY e.extname",
            description("e.oid", "pg_extension"),
        ),
        ObjectKind::Language => format!(
            "SELECT l.oid::int8 AS oid, l.lanname AS name, l.lanpltrusted AS trusted,
                    {}, {}, {}, {}, l.lanacl::text[] AS acl, {}
             FROM pg_language l
             WHERE l.lanispl AND l.lanname != 'plpgsql' AND {}
             ORDER BY l.lanname",
            nullable_proc("l.lanplcallfoid", "handler"),
            nullable_proc("l.laninline", "inline"),
            nullable_proc("l.lanvalidator", "validator"),
            owner("l.lanowner"),
            description("l.oid", "pg_language"),
            not_extension_member("pg_language", "l.oid"),
        ),
        ObjectKind::ForeignDataWrapper => format!(
            "SELECT w.oid::int8 AS oid, w.fdwname AS name, {}, {},
                    w.fdwoptions AS options, {}, w.fdwacl::text[] AS acl, {}
             FROM pg_foreign_data_wrapper w
             WHERE {}
             ORDER BY w.fdwname",
            nullable_proc("w.fdwhandler", "handler"),
            nullable_proc("w.fdwvalidator", "validator"),
            owner("w.fdwowner"),
            description("w.oid", "pg_foreign_data_wrapper"),
            not_extension_member("pg_foreign_data_wrapper", "w.oid"),
        ),
        ObjectKind::ForeignServer => format!(
            "SELECT s.oid::int8 AS oid, s.srvname AS name, w.fdwname AS wrapper,
                    s.srvtype AS type, s.srvversion AS version, s.srvoptions AS options,
                    {}, s.srvacl::text[] AS acl, {}
             FROM pg_foreign_server s JOIN pg_foreign_data_wrapper w ON s.srvfdw = w.oid
             WHERE {}
             ORDER BY s.srvname",
            owner("s.srvowner"),
            description("s.oid", "pg_foreign_server"),
            not_extension_member("pg_foreign_server", "s.oid"),
        ),
        ObjectKind::UserMapping => "SELECT CASE WHEN um.umuser = 0 THEN 'PUBLIC' ELSE um.usename END AS username,
                    um.srvname AS server, um.umoptions AS options
             FROM pg_user_mappings um
             ORDER BY um.srvname, um.usename"
            .to_string(),
        ObjectKind::Collation => {
            let locale = if version >= 170_000 {
                "COALESCE(c.collcollate, c.colllocale)"
            } else if version >= 150_000 {
                "COALESCE(c.collcollate, c.colliculocale)"
            } else {
                "c.collcollate"
            };
            let ctype = locale.replace("collcollate", "collctype");
            format!(
                "SELECT c.oid::int8 AS oid, n.nspname AS schema, c.collname AS name,
                        {locale} AS lc_collate, {ctype} AS lc_ctype, {}, {}
                 FROM pg_collation c JOIN pg_namespace n ON c.collnamespace = n.oid
                 WHERE {USER_SCHEMA} AND {}
                 ORDER BY n.nspname, c.collname",
                owner("c.collowner"),
                description("c.oid", "pg_collation"),
                not_extension_member("pg_collation", "c.oid"),
            )
        }
        ObjectKind::Conversion => format!(
            "SELECT c.oid::int8 AS oid, n.nspname AS schema, c.conname AS name,
                    pg_encoding_to_char(c.conforencoding) AS source_encoding,
                    pg_encoding_to_char(c.contoencoding) AS dest_encoding,
                    c.conproc::text AS function, c.condefault AS default, {}, {}
             FROM pg_conversion c JOIN pg_namespace n ON c.connamespace = n.oid
             WHERE {USER_SCHEMA} AND {}
             ORDER BY n.nspname, c.conname",
            owner("c.conowner"),
            description("c.oid", "pg_conversion"),
            not_extension_member("pg_conversion", "c.oid"),
        ),
        ObjectKind::BaseType => format!(
            "SELECT t.oid::int8 AS oid, n.nspname AS schema, t.typname AS name,
                    t.typinput::text AS input, t.typoutput::text AS output,
                    {}, {}, {}, {}, {},
                    CASE WHEN t.typlen > 0 THEN t.typlen END AS internallength,
                    CASE t.typalign WHEN 'c' THEN 'char' WHEN 's' THEN 'int2'
                         WHEN 'i' THEN 'int4' WHEN 'd' THEN 'double' END AS alignment,
                    CASE t.typstorage WHEN 'p' THEN 'plain' WHEN 'e' THEN 'external'
                         WHEN 'm' THEN 'main' WHEN 'x' THEN 'extended' END AS storage,
                    t.typbyval AS passedbyvalue,
                    CASE WHEN t.typcategory != 'U' THEN t.typcategory END AS category,
                    {}, t.typacl::text[] AS acl, {}
             FROM pg_type t JOIN pg_namespace n ON t.typnamespace = n.oid
             WHERE t.typtype = 'b' AND t.typelem = 0 AND {USER_SCHEMA} AND {}
             ORDER BY n.nspname, t.typname",
            nullable_proc("t.typreceive", "receive"),
            nullable_proc("t.typsend", "send"),
            nullable_proc("t.typmodin", "typmod_in"),
            nullable_proc("t.typmodout", "typmod_out"),
            nullable_proc("t.typanalyze", "analyze"),
            owner("t.typowner"),
            description("t.oid", "pg_type"),
            not_extension_member("pg_type", "t.oid"),
        ),
        ObjectKind::CompositeType => format!(
            "SELECT t.oid::int8 AS oid, n.nspname AS schema, t.typname AS name,
                    {} AS attributes, {}, t.typacl::text[] AS acl, {}
             FROM pg_type t JOIN pg_namespace n ON t.typnamespace = n.oid
                  JOIN pg_class c ON t.typrelid = c.oid
             WHERE t.typtype = 'c' AND c.relkind = 'c' AND {USER_SCHEMA} AND {}
             ORDER BY n.nspname, t.typname",
            attribute_list("c.oid", true),
            owner("t.typowner"),
            description("t.oid", "pg_type"),
            not_extension_member("pg_type", "t.oid"),
        ),
        ObjectKind::EnumType => format!(
            "SELECT t.oid::int8 AS oid, n.nspname AS schema, t.typname AS name,
                    ARRAY(SELECT e.enumlabel FROM pg_enum e WHERE e.enumtypid = t.oid
                          ORDER BY e.enumsortorder)::text[] AS labels,
                    {}, t.typacl::text[] AS acl, {}
             FROM pg_type t JOIN pg_namespace n ON t.typnamespace = n.oid
             WHERE t.typtype = 'e' AND {USER_SCHEMA} AND {}
             ORDER BY n.nspname, t.typname",
            owner("t.typowner"),
            description("t.oid", "pg_type"),
            not_extension_member("pg_type", "t.oid"),
        ),
        ObjectKind::RangeType => format!(
            "SELECT t.oid::int8 AS oid, n.nspname AS schema, t.typname AS name,
                    format_type(r.rngsubtype, NULL) AS subtype,
                    (SELECT opcname FROM pg_opclass WHERE oid = r.rngsubopc AND NOT opcdefault)
                        AS subtype_opclass,
                    CASE WHEN r.rngcollation != 0 AND r.rngcollation !=
                              (SELECT typcollation FROM pg_type WHERE oid = r.rngsubtype)
                         THEN (SELECT collname FROM pg_collation WHERE oid = r.rngcollation)
                    END AS collation,
                    {}, {}, {}, t.typacl::text[] AS acl, {}
             FROM pg_type t JOIN pg_namespace n ON t.typnamespace = n.oid
                  JOIN pg_range r ON r.rngtypid = t.oid
             WHERE t.typtype = 'r' AND {USER_SCHEMA} AND {}
             ORDER BY n.nspname, t.typname",
            nullable_proc("r.rngcanonical", "canonical"),
            nullable_proc("r.rngsubdiff", "subtype_diff"),
            owner("t.typowner"),
            description("t.oid", "pg_type"),
            not_extension_member("pg_type", "t.oid"),
        ),
        ObjectKind::Domain => format!(
            "SELECT t.oid::int8 AS oid, n.nspname AS schema, t.typname AS name,
                    format_type(t.typbasetype, t.typtypmod) AS type, t.typnotnull AS not_null,
                    t.typdefault AS default,
                    CASE WHEN t.typcollation != 0 AND t.typcollation !=
                              (SELECT typcollation FROM pg_type WHERE oid = t.typbasetype)
                         THEN (SELECT collname FROM pg_collation WHERE oid = t.typcollation)
                    END AS collation,
                    {}, t.typacl::text[] AS acl, {}
             FROM pg_type t JOIN pg_namespace n ON t.typnamespace = n.oid
             WHERE t.typtype = 'd' AND {USER_SCHEMA} AND {}
             ORDER BY n.nspname, t.typname",
            owner("t.typowner"),
            description("t.oid", "pg_type"),
            not_extension_member("pg_type", "t.oid"),
        ),
        ObjectKind::Function => {
            let plain = if version >= 110_000 {
                "p.prokind = 'f'"
            } else {
                "NOT p.proisagg AND NOT p.proiswindow"
            };
            format!(
                "SELECT p.oid::int8 AS oid, n.nspname AS schema, p.proname AS name,
                        pg_get_function_identity_arguments(p.oid) AS arguments,
                        CASE WHEN pg_get_function_arguments(p.oid)
                                  != pg_get_function_identity_arguments(p.oid)
                             THEN pg_get_function_arguments(p.oid) END AS allargs,
                        pg_get_function_result(p.oid) AS returns, l.lanname AS language,
                        CASE WHEN l.lanname != 'c' THEN p.prosrc END AS source,
                        CASE WHEN l.lanname = 'c' THEN p.probin END AS obj_file,
                        CASE WHEN l.lanname = 'c' THEN p.prosrc END AS link_symbol,
                        CASE p.provolatile WHEN 'i' THEN 'immutable' WHEN 's' THEN 'stable'
                        END AS volatility,
                        p.proisstrict AS strict, p.prosecdef AS security_definer,
                        p.proleakproof AS leakproof,
                        CASE WHEN (l.lanname IN ('c', 'internal') AND p.procost != 1)
                               OR (l.lanname NOT IN ('c', 'internal') AND p.procost != 100)
                             THEN p.procost END AS cost,
                        CASE WHEN p.proretset AND p.prorows != 1000 THEN p.prorows END AS rows,
                        p.proconfig AS configuration,
                        {}, p.proacl::text[] AS acl, {}
                 FROM pg_proc p JOIN pg_namespace n ON p.pronamespace = n.oid
                      JOIN pg_language l ON p.prolang = l.oid
                 WHERE {plain} AND {USER_SCHEMA} AND {}
                 ORDER BY n.nspname, p.proname",
                owner("p.proowner"),
                description("p.oid", "pg_proc"),
                not_extension_member("pg_proc", "p.oid"),
            )
        }
        ObjectKind::Aggregate => format!(
            "SELECT p.oid::int8 AS oid, n.nspname AS schema, p.proname AS name,
                    pg_get_function_identity_arguments(p.oid) AS arguments,
                    a.aggtransfn::text AS sfunc, format_type(a.aggtranstype, NULL) AS stype,
                    {}, a.agginitval AS initcond,
                    (SELECT oprname FROM pg_operator WHERE oid = a.aggsortop) AS sortop,
                    {}, p.proacl::text[] AS acl, {}
             FROM pg_proc p JOIN pg_namespace n ON p.pronamespace = n.oid
                  JOIN pg_aggregate a ON a.aggfnoid = p.oid
             WHERE {USER_SCHEMA} AND {}
             ORDER BY n.nspname, p.proname",
            nullable_proc("a.aggfinalfn", "finalfunc"),
            owner("p.proowner"),
            description("p.oid", "pg_proc"),
            not_extension_member("pg_proc", "p.oid"),
        ),
        ObjectKind::Operator => format!(
            "SELECT o.oid::int8 AS oid, n.nspname AS schema, o.oprname AS name,
                    CASE WHEN o.oprleft != 0 THEN format_type(o.oprleft, NULL) END AS leftarg,
                    CASE WHEN o.oprright != 0 THEN format_type(o.oprright, NULL) END AS rightarg,
                    o.oprcode::text AS procedure,
                    (SELECT oprname FROM pg_operator WHERE oid = o.oprcom) AS commutator,
                    (SELECT oprname FROM pg_operator WHERE oid = o.oprnegate) AS negator,
                    {}, {}, o.oprcanhash AS hashes, o.oprcanmerge AS merges, {}, {}
             FROM pg_operator o JOIN pg_namespace n ON o.oprnamespace = n.oid
             WHERE {USER_SCHEMA} AND {}
             ORDER BY n.nspname, o.oprname",
            nullable_proc("o.oprrest", "restrict"),
            nullable_proc("o.oprjoin", "join"),
            owner("o.oprowner"),
            description("o.oid", "pg_operator"),
            not_extension_member("pg_operator", "o.oid"),
        ),
        ObjectKind::OperatorFamily => format!(
            "SELECT f.oid::int8 AS oid, n.nspname AS schema, f.opfname AS name,
                    am.amname AS index_method, {}, {}
             FROM pg_opfamily f JOIN pg_namespace n ON f.opfnamespace = n.oid
                  JOIN pg_am am ON f.opfmethod = am.oid
             WHERE {USER_SCHEMA} AND {}
             ORDER BY n.nspname, f.opfname",
            owner("f.opfowner"),
            description("f.oid", "pg_opfamily"),
            not_extension_member("pg_opfamily", "f.oid"),
        ),
        ObjectKind::OperatorClass => format!(
            "SELECT c.oid::int8 AS oid, n.nspname AS schema, c.opcname AS name,
                    am.amname AS index_method, format_type(c.opcintype, NULL) AS type,
                    c.opcdefault AS default,
                    CASE WHEN f.opfname != c.opcname THEN f.opfname END AS family,
                    CASE WHEN c.opckeytype != 0 THEN format_type(c.opckeytype, NULL) END
                        AS storage,
                    ARRAY(SELECT ao.amopstrategy || ' ' || ao.amopopr::regoperator
                          FROM pg_amop ao WHERE ao.amopfamily = c.opcfamily
                          ORDER BY ao.amopstrategy)::text[] AS operators,
                    ARRAY(SELECT ap.amprocnum || ' ' || ap.amproc::regprocedure
                          FROM pg_amproc ap WHERE ap.amprocfamily = c.opcfamily
                          ORDER BY ap.amprocnum)::text[] AS functions,
                    {}, {}
             FROM pg_opclass c JOIN pg_namespace n ON c.opcnamespace = n.oid
                  JOIN pg_am am ON c.opcmethod = am.oid
                  JOIN pg_opfamily f ON c.opcfamily = f.oid
             WHERE {USER_SCHEMA} AND {}
             ORDER BY n.nspname, c.opcname",
            owner("c.opcowner"),
            description("c.oid", "pg_opclass"),
            not_extension_member("pg_opclass", "c.oid"),
        ),
        ObjectKind::Cast => format!(
            "SELECT c.oid::int8 AS oid, format_type(c.castsource, NULL) AS source,
                    format_type(c.casttarget, NULL) AS target,
                    CASE WHEN c.castfunc != 0 THEN c.castfunc::regprocedure::text END AS function,
                    CASE c.castcontext WHEN 'e' THEN 'explicit' WHEN 'a' THEN 'assignment'
                         ELSE 'implicit' END AS context,
                    CASE c.castmethod WHEN 'f' THEN 'function' WHEN 'i' THEN 'inout'
                         ELSE 'binary' END AS method,
                    {}
             FROM pg_cast c
             WHERE c.oid >= 16384 AND {}
             ORDER BY 2, 3",
            description("c.oid", "pg_cast"),
            not_extension_member("pg_cast", "c.oid"),
        ),
        ObjectKind::TsParser => format!(
            "SELECT p.oid::int8 AS oid, n.nspname AS schema, p.prsname AS name,
                    p.prsstart::text AS start, p.prstoken::text AS gettoken,
                    p.prsend::text AS end, p.prslextype::text AS lextypes, {}, {}
             FROM pg_ts_parser p JOIN pg_namespace n ON p.prsnamespace = n.oid
             WHERE {USER_SCHEMA} AND {}
             ORDER BY n.nspname, p.prsname",
            nullable_proc("p.prsheadline", "headline"),
            description("p.oid", "pg_ts_parser"),
            not_extension_member("pg_ts_parser", "p.oid"),
        ),
        ObjectKind::TsTemplate => format!(
            "SELECT t.oid::int8 AS oid, n.nspname AS schema, t.tmplname AS name,
                    {}, t.tmpllexize::text AS lexize, {}
             FROM pg_ts_template t JOIN pg_namespace n ON t.tmplnamespace = n.oid
             WHERE {USER_SCHEMA} AND {}
             ORDER BY n.nspname, t.tmplname",
            nullable_proc("t.tmplinit", "init"),
            description("t.oid", "pg_ts_template"),
            not_extension_member("pg_ts_template", "t.oid"),
        ),
        ObjectKind::TsDictionary => format!(
            "SELECT d.oid::int8 AS oid, n.nspname AS schema, d.dictname AS name,
                    CASE WHEN tn.nspname IN ('pg_catalog', n.nspname) THEN t.tmplname
                         ELSE tn.nspname || '.' || t.tmplname END AS template,
                    d.dictinitoption AS options, {}, {}
             FROM pg_ts_dict d JOIN pg_namespace n ON d.dictnamespace = n.oid
                  JOIN pg_ts_template t ON d.dicttemplate = t.oid
                  JOIN pg_namespace tn ON t.tmplnamespace = tn.oid
             WHERE {USER_SCHEMA} AND {}
             ORDER BY n.nspname, d.dictname",
            owner("d.dictowner"),
            description("d.oid", "pg_ts_dict"),
            not_extension_member("pg_ts_dict", "d.oid"),
        ),
        ObjectKind::TsConfiguration => format!(
            "SELECT c.oid::int8 AS oid, n.nspname AS schema, c.cfgname AS name,
                    CASE WHEN pn.nspname IN ('pg_catalog', n.nspname) THEN p.prsname
                         ELSE pn.nspname || '.' || p.prsname END AS parser,
                    {}, {}
             FROM pg_ts_config c JOIN pg_namespace n ON c.cfgnamespace = n.oid
                  JOIN pg_ts_parser p ON c.cfgparser = p.oid
                  JOIN pg_namespace pn ON p.prsnamespace = pn.oid
             WHERE {USER_SCHEMA} AND {}
             ORDER BY n.nspname, c.cfgname",
            owner("c.cfgowner"),
            description("c.oid", "pg_ts_config"),
            not_extension_member("pg_ts_config", "c.oid"),
        ),
        ObjectKind::Sequence => format!(
            "SELECT c.oid::int8 AS oid, n.nspname AS schema, c.relname AS name,
                    format_type(s.seqtypid, NULL) AS data_type,
                    s.seqstart AS start_value, s.seqincrement AS increment_by,
                    s.seqmax AS max_value, s.seqmin AS min_value,
                    s.seqcache AS cache_value, s.seqcycle AS cycle,
                    o.relname AS owner_table, o.attname AS owner_column,
                    {}, c.relacl::text[] AS acl, {}
             FROM pg_class c JOIN pg_namespace n ON c.relnamespace = n.oid
                  JOIN pg_sequence s ON s.seqrelid = c.oid
                  LEFT JOIN (SELECT d.objid, t.relname, a.attname
                             FROM pg_depend d JOIN pg_class t ON d.refobjid = t.oid
                                  JOIN pg_attribute a ON a.attrelid = t.oid
                                                     AND a.attnum = d.refobjsubid
                             WHERE d.classid = 'pg_class'::regclass
                               AND d.refclassid = 'pg_class'::regclass
                               AND d.deptype = 'a' AND d.refobjsubid > 0) o
                       ON o.objid = c.oid
             WHERE c.relkind = 'S' AND {USER_SCHEMA} AND {}
               AND NOT EXISTS (SELECT 1 FROM pg_depend i WHERE i.objid = c.oid
                               AND i.classid = 'pg_class'::regclass AND i.deptype = 'i')
             ORDER BY n.nspname, c.relname",
            owner("c.relowner"),
            description("c.oid", "pg_class"),
            not_extension_member("pg_class", "c.oid"),
        ),
        ObjectKind::Table => format!(
            "SELECT c.oid::int8 AS oid, n.nspname AS schema, c.relname AS name,
                    ARRAY(SELECT CASE WHEN pn.nspname = n.nspname THEN p.relname
                                      ELSE pn.nspname || '.' || p.relname END
                          FROM pg_inherits i JOIN pg_class p ON i.inhparent = p.oid
                               JOIN pg_namespace pn ON p.relnamespace = pn.oid
                          WHERE i.inhrelid = c.oid ORDER BY i.inhseqno)::text[] AS inherits,
                    c.relpersistence = 'u' AS unlogged, c.reloptions AS options,
                    ts.spcname AS tablespace, {}, c.relacl::text[] AS acl, {}
             FROM pg_class c JOIN pg_namespace n ON c.relnamespace = n.oid
                  LEFT JOIN pg_tablespace ts ON c.reltablespace = ts.oid
             WHERE c.relkind IN ('r', 'p') AND {USER_SCHEMA} AND {}
             ORDER BY n.nspname, c.relname",
            owner("c.relowner"),
            description("c.oid", "pg_class"),
            not_extension_member("pg_class", "c.oid"),
        ),
        ObjectKind::ForeignTable => format!(
            "SELECT c.oid::int8 AS oid, n.nspname AS schema, c.relname AS name,
                    s.srvname AS server, f.ftoptions AS options,
                    {}, c.relacl::text[] AS acl, {}
             FROM pg_class c JOIN pg_namespace n ON c.relnamespace = n.oid
                  JOIN pg_foreign_table f ON f.ftrelid = c.oid
                  JOIN pg_foreign_server s ON f.ftserver = s.oid
             WHERE c.relkind = 'f' AND {USER_SCHEMA} AND {}
             ORDER BY n.nspname, c.relname",
            owner("c.relowner"),
            description("c.oid", "pg_class"),
            not_extension_member("pg_class", "c.oid"),
        ),
        ObjectKind::Column => return None,
        ObjectKind::CheckConstraint => format!(
            "SELECT co.oid::int8 AS oid, n.nspname AS schema,
                    COALESCE(c.relname, t.typname) AS table, co.conname AS name,
                    regexp_replace(pg_get_constraintdef(co.oid),
                                   '^CHECK \\((.*)\\)( NOT VALID)?$', '\\1') AS expression,
                    {} AS columns,
                    NOT co.conislocal AS inherited, co.contypid != 0 AS on_domain, {}
             FROM pg_constraint co JOIN pg_namespace n ON co.connamespace = n.oid
                  LEFT JOIN pg_class c ON co.conrelid = c.oid
                  LEFT JOIN pg_type t ON co.contypid = t.oid
             WHERE co.contype = 'c' AND {USER_SCHEMA}
             ORDER BY n.nspname, 3, co.conname",
            key_columns("co.conrelid", "co.conkey"),
            description("co.oid", "pg_constraint"),
        ),
        ObjectKind::PrimaryKey | ObjectKind::UniqueConstraint => format!(
            "SELECT co.oid::int8 AS oid, n.nspname AS schema, c.relname AS table,
                    co.conname AS name, {} AS columns, i.indisclustered AS cluster,
                    NOT co.conislocal AS inherited, {}
             FROM pg_constraint co JOIN pg_class c ON co.conrelid = c.oid
                  JOIN pg_namespace n ON c.relnamespace = n.oid
                  JOIN pg_index i ON i.indexrelid = co.conindid
             WHERE co.contype = '{}' AND {USER_SCHEMA}
             ORDER BY n.nspname, c.relname, co.conname",
            key_columns("co.conrelid", "co.conkey"),
            description("co.oid", "pg_constraint"),
            if kind == ObjectKind::PrimaryKey { 'p' } else { 'u' },
        ),
        ObjectKind::ForeignKey => format!(
            "SELECT co.oid::int8 AS oid, n.nspname AS schema, c.relname AS table,
                    co.conname AS name, {} AS columns,
                    jsonb_build_object(
                        'schema', CASE WHEN rn.nspname != n.nspname THEN rn.nspname END,
                        'table', r.relname,
                        'columns', {}) AS references,
                    CASE co.confupdtype WHEN 'r' THEN 'restrict' WHEN 'c' THEN 'cascade'
                         WHEN 'n' THEN 'set null' WHEN 'd' THEN 'set default' END AS on_update,
                    CASE co.confdeltype WHEN 'r' THEN 'restrict' WHEN 'c' THEN 'cascade'
                         WHEN 'n' THEN 'set null' WHEN 'd' THEN 'set default' END AS on_delete,
                    CASE co.confmatchtype WHEN 'f' THEN 'full' WHEN 'p' THEN 'partial'
                    END AS match_type,
                    co.condeferrable AS deferrable, co.condeferred AS deferred,
                    NOT co.conislocal AS inherited, {}
             FROM pg_constraint co JOIN pg_class c ON co.conrelid = c.oid
                  JOIN pg_namespace n ON c.relnamespace = n.oid
                  JOIN pg_class r ON co.confrelid = r.oid
                  JOIN pg_namespace rn ON r.relnamespace = rn.oid
             WHERE co.contype = 'f' AND {USER_SCHEMA}
             ORDER BY n.nspname, c.relname, co.conname",
            key_columns("co.conrelid", "co.conkey"),
            key_columns("co.confrelid", "co.confkey"),
            description("co.oid", "pg_constraint"),
        ),
        ObjectKind::Index => {
            let key_count = if version >= 110_000 {
                "i.indnkeyatts"
            } else {
                "i.indnatts"
            };
            format!(
                "SELECT c.oid::int8 AS oid, n.nspname AS schema, t.relname AS table,
                        c.relname AS name,
                        (SELECT jsonb_agg(CASE WHEN k.attnum > 0 THEN to_jsonb(a.attname)
                                  ELSE jsonb_build_object(
                                      pg_get_indexdef(i.indexrelid, k.ord::int, true),
                                      jsonb_build_object('type', 'expression')) END
                                  ORDER BY k.ord)
                         FROM unnest(i.indkey::int2[]) WITH ORDINALITY k(attnum, ord)
                              LEFT JOIN pg_attribute a ON a.attrelid = i.indrelid
                                                      AND a.attnum = k.attnum
                         WHERE k.ord <= {key_count}) AS keys,
                        am.amname AS access_method, i.indisunique AS unique,
                        pg_get_expr(i.indpred, i.indrelid) AS predicate,
                        ts.spcname AS tablespace, i.indisclustered AS cluster, {}
                 FROM pg_index i JOIN pg_class c ON i.indexrelid = c.oid
                      JOIN pg_class t ON i.indrelid = t.oid
                      JOIN pg_namespace n ON c.relnamespace = n.oid
                      JOIN pg_am am ON c.relam = am.oid
                      LEFT JOIN pg_tablespace ts ON c.reltablespace = ts.oid
                 WHERE {USER_SCHEMA} AND t.relkind IN ('r', 'p', 'm')
                   AND NOT EXISTS (SELECT 1 FROM pg_constraint co WHERE co.conindid = c.oid
                                   AND co.contype IN ('p', 'u', 'x'))
                 ORDER BY n.nspname, t.relname, c.relname",
                description("c.oid", "pg_class"),
            )
        }
        ObjectKind::View => format!(
            "SELECT c.oid::int8 AS oid, n.nspname AS schema, c.relname AS name,
                    pg_get_viewdef(c.oid) AS definition, {} AS columns,
                    {}, c.relacl::text[] AS acl, {}
             FROM pg_class c JOIN pg_namespace n ON c.relnamespace = n.oid
             WHERE c.relkind = 'v' AND {USER_SCHEMA} AND {}
             ORDER BY n.nspname, c.relname",
            attribute_list("c.oid", false),
            owner("c.relowner"),
            description("c.oid", "pg_class"),
            not_extension_member("pg_class", "c.oid"),
        ),
        ObjectKind::MaterializedView => format!(
            "SELECT c.oid::int8 AS oid, n.nspname AS schema, c.relname AS name,
                    pg_get_viewdef(c.oid) AS definition, {} AS columns,
                    NOT c.relispopulated AS with_no_data, ts.spcname AS tablespace,
                    {}, c.relacl::text[] AS acl, {}
             FROM pg_class c JOIN pg_namespace n ON c.relnamespace = n.oid
                  LEFT JOIN pg_tablespace ts ON c.reltablespace = ts.oid
             WHERE c.relkind = 'm' AND {USER_SCHEMA} AND {}
             ORDER BY n.nspname, c.relname",
            attribute_list("c.oid", false),
            owner("c.relowner"),
            description("c.oid", "pg_class"),
            not_extension_member("pg_class", "c.oid"),
        ),
        ObjectKind::Trigger => format!(
            "SELECT tg.oid::int8 AS oid, n.nspname AS schema, c.relname AS table,
                    tg.tgname AS name,
                    CASE WHEN tg.tgtype & 2 = 2 THEN 'before'
                         WHEN tg.tgtype & 64 = 64 THEN 'instead of' ELSE 'after' END AS timing,
                    array_remove(ARRAY[
                        CASE WHEN tg.tgtype & 4 = 4 THEN 'insert' END,
                        CASE WHEN tg.tgtype & 16 = 16 THEN 'update' END,
                        CASE WHEN tg.tgtype & 8 = 8 THEN 'delete' END,
                        CASE WHEN tg.tgtype & 32 = 32 THEN 'truncate' END], NULL) AS events,
                    {} AS columns,
                    CASE WHEN tg.tgtype & 1 = 1 THEN 'row' ELSE 'statement' END AS level,
                    substring(pg_get_triggerdef(tg.oid) FROM 'WHEN \\((.*)\\) EXECUTE')
                        AS condition,
                    tg.tgfoid::regproc::text AS procedure,
                    CASE WHEN tg.tgnargs > 0 THEN
                        (string_to_array(encode(tg.tgargs, 'escape'), '\\000'))
                            [1:tg.tgnargs] END AS arguments,
                    tg.tgconstraint != 0 AS constraint, tg.tgdeferrable AS deferrable,
                    tg.tginitdeferred AS initially_deferred, {}
             FROM pg_trigger tg JOIN pg_class c ON tg.tgrelid = c.oid
                  JOIN pg_namespace n ON c.relnamespace = n.oid
             WHERE NOT tg.tgisinternal AND {USER_SCHEMA}
             ORDER BY n.nspname, c.relname, tg.tgname",
            key_columns("tg.tgrelid", "tg.tgattr::int2[]"),
            description("tg.oid", "pg_trigger"),
        ),
        ObjectKind::Rule => format!(
            "SELECT r.oid::int8 AS oid, n.nspname AS schema, c.relname AS table,
                    r.rulename AS name, pg_get_ruledef(r.oid) AS definition, {}
             FROM pg_rewrite r JOIN pg_class c ON r.ev_class = c.oid
                  JOIN pg_namespace n ON c.relnamespace = n.oid
             WHERE r.rulename != '_RETURN' AND {USER_SCHEMA}
             ORDER BY n.nspname, c.relname, r.rulename",
            description("r.oid", "pg_rewrite"),
        ),
        ObjectKind::EventTrigger => format!(
            "SELECT e.oid::int8 AS oid, e.evtname AS name, e.evtevent AS event,
                    e.evttags AS tags, e.evtfoid::regproc::text AS procedure,
                    CASE e.evtenabled WHEN 'D' THEN 'disabled' WHEN 'R' THEN 'replica'
                         WHEN 'A' THEN 'always' END AS enabled,
                    {}, {}
             FROM pg_event_trigger e
             WHERE {}
             ORDER BY e.evtname",
            owner("e.evtowner"),
            description("e.oid", "pg_event_trigger"),
            not_extension_member("pg_event_trigger", "e.oid"),
        ),
    };
    Some(json_rows(&inner))
}

/// Columns of tables and foreign tables, in position order.
#[must_use]
pub fn columns() -> String {
    json_rows(&format!(
        "SELECT n.nspname AS schema, c.relname AS table, a.attnum AS number,
                a.attname AS name, format_type(a.atttypid, a.atttypmod) AS type,
                a.attnotnull AS not_null, pg_get_expr(d.adbin, d.adrelid) AS default,
                CASE WHEN a.attcollation != 0 AND a.attcollation != t.typcollation
                     THEN (SELECT collname FROM pg_collation WHERE oid = a.attcollation)
                END AS collation,
                CASE WHEN a.attstattarget >= 0 THEN a.attstattarget END AS statistics,
                NOT a.attislocal AS inherited,
                col_description(c.oid, a.attnum) AS description
         FROM pg_attribute a JOIN pg_class c ON a.attrelid = c.oid
              JOIN pg_namespace n ON c.relnamespace = n.oid
              JOIN pg_type t ON a.atttypid = t.oid
              LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
         WHERE c.relkind IN ('r', 'p', 'f') AND a.attnum > 0 AND NOT a.attisdropped
           AND {USER_SCHEMA}
         ORDER BY n.nspname, c.relname, a.attnum"
    ))
}

/// Normal dependencies between user objects, as `(catalog, oid)` pairs.
#[must_use]
pub fn dependencies() -> String {
    json_rows(
        "SELECT d.classid::regclass::text AS catalog, d.objid::int8 AS oid,
                d.refclassid::regclass::text AS ref_catalog, d.refobjid::int8 AS ref_oid
         FROM pg_depend d
         WHERE d.deptype = 'n' AND d.objid >= 16384 AND d.refobjid >= 16384
           AND d.classid NOT IN ('pg_attrdef'::regclass, 'pg_rewrite'::regclass)",
    )
}

/// Rewrite rule node trees of views and materialized views.
#[must_use]
pub fn view_dependencies() -> String {
    json_rows(
        "SELECT r.ev_class::int8 AS oid, r.ev_action::text AS action
         FROM pg_rewrite r
         WHERE r.rulename = '_RETURN' AND r.ev_class >= 16384",
    )
}

/// Objects referenced by column defaults, attributed to the table.
#[must_use]
pub fn default_dependencies() -> String {
    json_rows(
        "SELECT ad.adrelid::int8 AS oid, d.refclassid::regclass::text AS ref_catalog,
                d.refobjid::int8 AS ref_oid
         FROM pg_attrdef ad
              JOIN pg_depend d ON d.classid = 'pg_attrdef'::regclass AND d.objid = ad.oid
         WHERE d.deptype = 'n' AND d.refobjid >= 16384",
    )
}

/// Every query needed to load a catalog from a server of `version`, in
/// the order they are run.
#[must_use]
pub fn all(version: u32) -> Vec<String> {
    let mut queries: Vec<String> = ObjectKind::ALL
        .iter()
        .filter_map(|kind| object_query(*kind, version))
        .collect();
    queries.push(columns());
    queries.push(dependencies());
    queries.push(view_dependencies());
    queries.push(default_dependencies());
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_but_column_has_a_query() {
        for kind in ObjectKind::ALL {
            assert_eq!(
                object_query(*kind, 160_000).is_some(),
                *kind != ObjectKind::Column,
                "{kind}"
            );
        }
    }

    #[test]
    fn test_version_aware_function_query() {
        let old = object_query(ObjectKind::Function, 100_000).unwrap();
        let new = object_query(ObjectKind::Function, 150_000).unwrap();
        assert!(old.contains("proisagg"));
        assert!(new.contains("prokind = 'f'"));
    }

    #[test]
    fn test_rows_are_json() {
        let query = object_query(ObjectKind::Schema, 160_000).unwrap();
        assert!(query.starts_with("SELECT jsonb_strip_nulls(to_jsonb(q))::text FROM ("));
        assert!(query.contains("nspname NOT LIKE 'pg\\_temp\\_%'"));
    }
}
