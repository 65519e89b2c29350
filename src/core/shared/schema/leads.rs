diesel::table! {
    organizations (id) {
        id -> Uuid,
        name -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    leads (id) {
        id -> Uuid,
        organization_id -> Uuid,
        first_name -> Nullable<Varchar>,
        last_name -> Nullable<Varchar>,
        email -> Nullable<Varchar>,
        phone -> Nullable<Varchar>,
        company -> Nullable<Varchar>,
        job_title -> Nullable<Varchar>,
        website -> Nullable<Varchar>,
        industry -> Nullable<Varchar>,
        score -> Int4,
        status -> Varchar,
        source -> Varchar,
        value -> Nullable<Int8>,
        lead_temperature -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    communications (id) {
        id -> Uuid,
        lead_id -> Uuid,
        organization_id -> Uuid,
        communication_type -> Varchar,
        direction -> Varchar,
        subject -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    lead_score_history (id) {
        id -> Uuid,
        lead_id -> Uuid,
        organization_id -> Uuid,
        previous_score -> Int4,
        new_score -> Int4,
        score_change -> Int4,
        reason -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(leads -> organizations (organization_id));
diesel::joinable!(communications -> leads (lead_id));
diesel::joinable!(lead_score_history -> leads (lead_id));

diesel::allow_tables_to_appear_in_same_query!(
    organizations,
    leads,
    communications,
    lead_score_history,
);
